use std::path::PathBuf;
use std::time::Duration;

use switchboard_fabric::{
    channel::Channel,
    codec::{BincodeCodec, Codec},
    dial,
    error::Error,
    transport::{
        TcpTransport, TcpTransportListener, Transport, TransportListener, UnixTransport,
        UnixTransportListener,
    },
    wire::{self, ErrorKind, Header},
    DialOptions,
};
use tokio::io::AsyncWriteExt;

/// Helper to get a free port
async fn get_listener() -> (TcpTransportListener, std::net::SocketAddr) {
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn socket_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "switchboard_fabric_{}_{}.sock",
        name,
        std::process::id()
    ))
}

#[tokio::test]
async fn tcp_send_receive_single_message() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let (mut transport, _addr) = listener.accept().await.unwrap();
        let received = transport.receive().await.unwrap();
        transport.send(&received).await.unwrap();
    });

    let mut client = TcpTransport::connect(addr).await.unwrap();
    let msg = b"hello world";
    client.send(msg).await.unwrap();
    let response = client.receive().await.unwrap();

    assert_eq!(response, msg);
}

#[tokio::test]
async fn tcp_multiple_messages_preserve_boundaries() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let (mut transport, _addr) = listener.accept().await.unwrap();
        for _ in 0..3 {
            let msg = transport.receive().await.unwrap();
            transport.send(&msg).await.unwrap();
        }
    });

    let mut client = TcpTransport::connect(addr).await.unwrap();
    let messages = vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()];

    for msg in &messages {
        client.send(msg).await.unwrap();
        let response = client.receive().await.unwrap();
        assert_eq!(&response, msg);
    }
}

#[tokio::test]
async fn tcp_receive_timeout_fires() {
    let (listener, addr) = get_listener().await;

    // Server holds the connection open and never answers
    tokio::spawn(async move {
        let (_transport, _addr) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut client = TcpTransport::builder()
        .address(addr)
        .receive_timeout(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();

    client.send(b"hello").await.unwrap();

    match client.receive().await {
        Err(Error::Timeout(what)) => assert_eq!(what, "Receive"),
        other => panic!("Expected timeout error, got {:?}", other),
    }
}

#[tokio::test]
async fn tcp_rejects_oversized_frame() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    // Frame header claiming 200MB, over the 100MB default
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_u32(200 * 1024 * 1024).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let mut client = TcpTransport::connect(addr).await.unwrap();

    match client.receive().await {
        Err(e @ Error::InvalidFrame(_)) => {
            assert!(e.is_protocol());
            assert!(e.to_string().contains("too large"));
        }
        other => panic!("Expected InvalidFrame error, got {:?}", other),
    }
}

#[tokio::test]
async fn configured_frame_limit_applies_to_sends() {
    let (listener, addr) = get_listener().await;
    tokio::spawn(async move {
        let _ = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let mut client = TcpTransport::builder()
        .address(addr)
        .max_frame_len(8)
        .connect()
        .await
        .unwrap();

    assert!(matches!(
        client.send(&[0u8; 9]).await,
        Err(Error::InvalidFrame(_))
    ));
}

#[tokio::test]
async fn channel_envelope_roundtrip() {
    let (listener, addr) = get_listener().await;

    // Echo server answering each request with the same payload
    tokio::spawn(async move {
        let (transport, _addr) = listener.accept().await.unwrap();
        let mut channel = Channel::from_transport(transport);

        let request = channel.read_envelope().await.unwrap();
        assert_eq!(request.header.service_method, "Echo.Echo");
        let reply = Header::response(request.header.seq, ErrorKind::None, "");
        channel.write_response(reply, &request.payload).await.unwrap();
    });

    let channel = Channel::tcp(addr).await.unwrap();
    let (mut reader, mut writer) = channel.into_split();

    let payload = BincodeCodec.encode("Hello, switchboard").unwrap();
    writer.write_request("Echo.Echo", 41, &payload).await.unwrap();

    let response = reader.read_envelope().await.unwrap();
    assert_eq!(response.header.seq, 41);
    assert!(response.header.service_method.is_empty());
    assert!(!response.header.is_error());

    let text: String = BincodeCodec.decode(&response.payload).unwrap();
    assert_eq!(text, "Hello, switchboard");
}

#[tokio::test]
async fn corrupted_envelope_is_rejected() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut frame = wire::encode(Header::request("Echo.Echo", 1), b"payload").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x55;
        stream.write_u32(frame.len() as u32).await.unwrap();
        stream.write_all(&frame).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let mut channel = Channel::tcp(addr).await.unwrap();
    let err = channel.read_envelope().await.unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(err.is_protocol());
}

#[tokio::test]
async fn connection_closed_error() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let (mut transport, _addr) = listener.accept().await.unwrap();
        transport.close().await.unwrap();
    });

    let mut client = TcpTransport::connect(addr).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    match client.receive().await {
        Err(Error::ConnectionClosed) => {}
        other => panic!("Expected ConnectionClosed, got {:?}", other),
    }
}

#[tokio::test]
async fn transport_listener_trait_usage() {
    let (mut listener, addr) = get_listener().await;

    async fn accept_generic<L: TransportListener>(listener: &L) -> Result<L::Transport, Error> {
        listener.accept().await
    }

    tokio::spawn(async move {
        let mut client = TcpTransport::connect(addr).await.unwrap();
        client.send(b"test").await.unwrap();
    });

    let mut transport = accept_generic(&listener).await.unwrap();
    let msg = transport.receive().await.unwrap();
    assert_eq!(msg, b"test");

    TransportListener::close(&mut listener).await.unwrap();
}

#[tokio::test]
async fn dial_by_network_name() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let (mut transport, _addr) = listener.accept().await.unwrap();
        let msg = transport.receive().await.unwrap();
        transport.send(&msg).await.unwrap();
    });

    let mut transport = dial("tcp", &addr.to_string(), &DialOptions::default())
        .await
        .unwrap();
    transport.send(b"dialed").await.unwrap();
    assert_eq!(transport.receive().await.unwrap(), b"dialed");
}

#[tokio::test]
async fn dial_rejects_unknown_network() {
    match dial("udp", "127.0.0.1:1", &DialOptions::default()).await {
        Err(Error::UnsupportedNetwork(name)) => assert_eq!(name, "udp"),
        Err(e) => panic!("Expected UnsupportedNetwork, got {:?}", e),
        Ok(_) => panic!("Expected UnsupportedNetwork, got a transport"),
    }
}

// Unix Socket Tests

#[tokio::test]
async fn unix_send_receive_single_message() {
    let socket_path = socket_path("single");
    let listener = UnixTransportListener::bind(&socket_path).await.unwrap();

    tokio::spawn(async move {
        let mut transport = listener.accept().await.unwrap();
        let received = transport.receive().await.unwrap();
        transport.send(&received).await.unwrap();
    });

    let mut client = UnixTransport::connect(&socket_path).await.unwrap();
    let msg = b"hello unix";
    client.send(msg).await.unwrap();
    let response = client.receive().await.unwrap();

    assert_eq!(response, msg);
    assert!(client.peer().starts_with("unix:"));
}

#[tokio::test]
async fn unix_listener_cleans_up_socket() {
    let socket_path = socket_path("cleanup");

    {
        let mut listener = UnixTransportListener::bind(&socket_path).await.unwrap();
        assert!(socket_path.exists());

        listener.close().await.unwrap();
    }

    assert!(!socket_path.exists());
}

#[tokio::test]
async fn unix_timeout_works() {
    let socket_path = socket_path("timeout");
    let listener = UnixTransportListener::bind(&socket_path).await.unwrap();

    tokio::spawn(async move {
        let _transport = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut client = UnixTransport::builder()
        .path(&socket_path)
        .receive_timeout(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();

    client.send(b"hello").await.unwrap();

    assert!(matches!(client.receive().await, Err(Error::Timeout(_))));
}

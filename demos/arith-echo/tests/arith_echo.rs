use std::net::SocketAddr;

use switchboard_demo::{
    registry, ArithClient, ArithRequest, ArithResponse, EchoClient, EchoRequest,
};
use switchboard_fabric::transport::TcpTransportListener;
use switchboard_rpc::{Client, Error, Server};

async fn start_demo_server() -> SocketAddr {
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Server::new(registry().unwrap());
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn demo_client() -> Client {
    let addr = start_demo_server().await;
    Client::dial("tcp", &addr.to_string()).await.unwrap()
}

#[tokio::test]
async fn arithmetic_over_tcp() {
    let client = demo_client().await;
    let arith = ArithClient::new(&client);

    let cases = [(1, 2), (-5, 3), (0, 0), (i32::MAX, 0), (-40000, 40000)];
    for (a, b) in cases {
        let args = ArithRequest::new(a, b);
        assert_eq!(arith.add(&args).await.unwrap().c, a + b);
        assert_eq!(arith.mul(&args).await.unwrap().c, a * b);
    }

    let divisions = [(13, 5, 2), (-7, 2, -3), (7, -2, -3), (0, 9, 0), (i32::MIN, 1, i32::MIN)];
    for (a, b, quotient) in divisions {
        assert_eq!(arith.div(&ArithRequest::new(a, b)).await.unwrap().c, quotient);
    }
}

#[tokio::test]
async fn divide_by_zero_is_an_application_error() {
    let client = demo_client().await;

    for a in [0, 1, -1, i32::MAX] {
        let mut reply = ArithResponse { c: 99 };
        let err = client
            .call_into("ArithService.Div", &ArithRequest::new(a, 0), &mut reply)
            .await
            .unwrap_err();

        assert!(matches!(&err, Error::Application(text) if text == "divide by zero"));
        assert_eq!(reply.c, 99);
    }

    // The connection is still good afterwards
    let sum = ArithClient::new(&client)
        .add(&ArithRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(sum.c, 4);
}

#[tokio::test]
async fn error_method_always_fails() {
    let client = demo_client().await;
    let arith = ArithClient::new(&client);

    for (a, b) in [(0, 0), (1, 2), (-3, 0)] {
        let err = arith.error(&ArithRequest::new(a, b)).await.unwrap_err();
        assert_eq!(err.to_string(), "ArithError");
    }
}

#[tokio::test]
async fn echo_round_trips_any_text() {
    let client = demo_client().await;
    let echo = EchoClient::new(&client);

    for msg in ["", "Hello Protobuf-RPC!", "héllo wörld", "日本語のテキスト 🚀"] {
        let reply = echo.echo(&EchoRequest::new(msg)).await.unwrap();
        assert_eq!(reply.msg, msg);
    }
}

#[tokio::test]
async fn echo_twice_repeats_the_message() {
    let client = demo_client().await;
    let echo = EchoClient::new(&client);

    let reply = echo.echo_twice(&EchoRequest::new("ab")).await.unwrap();
    assert_eq!(reply.msg, "abab");

    let reply = echo.echo_twice(&EchoRequest::new("")).await.unwrap();
    assert_eq!(reply.msg, "");
}

#[tokio::test]
async fn lowercase_method_names_resolve() {
    let client = demo_client().await;

    let reply: ArithResponse = client
        .call("ArithService.mul", &ArithRequest::new(6, 7))
        .await
        .unwrap();
    assert_eq!(reply.c, 42);
}

#[tokio::test]
async fn stubs_work_in_process() {
    let registry = registry().unwrap();

    let sum = ArithClient::new(&registry)
        .add(&ArithRequest::new(20, 22))
        .await
        .unwrap();
    assert_eq!(sum.c, 42);

    let err = ArithClient::new(&registry)
        .div(&ArithRequest::new(1, 0))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "divide by zero");

    let echoed = EchoClient::new(&registry)
        .echo(&EchoRequest::new("local"))
        .await
        .unwrap();
    assert_eq!(echoed.msg, "local");
}

#[tokio::test]
async fn registry_lists_demo_services() {
    let registry = registry().unwrap();

    assert_eq!(registry.service_names(), vec!["ArithService", "EchoService"]);
    assert_eq!(registry.method_names("EchoService"), vec!["Echo", "EchoTwice"]);
}

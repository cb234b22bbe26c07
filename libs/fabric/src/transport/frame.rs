use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::transport::{FrameRead, FrameWrite};

/// Largest frame accepted by default (100MB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

fn map_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

/// The length prefix is a u32, so no limit can go beyond it
fn clamp_frame_len(max_frame_len: usize) -> usize {
    max_frame_len.min(u32::MAX as usize)
}

/// Read half of a length-prefixed stream
///
/// Each frame is a 4-byte big-endian length followed by that many bytes.
pub struct FrameReader<R> {
    inner: R,
    max_frame_len: usize,
    receive_timeout: Option<Duration>,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            receive_timeout: None,
        }
    }

    pub fn set_max_frame_len(&mut self, max_frame_len: usize) {
        self.max_frame_len = clamp_frame_len(max_frame_len);
    }

    pub fn set_receive_timeout(&mut self, timeout: Option<Duration>) {
        self.receive_timeout = timeout;
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let len = self.inner.read_u32().await.map_err(map_eof)? as usize;

        if len > self.max_frame_len {
            tracing::warn!(len, max = self.max_frame_len, "incoming frame over limit");
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes (max {})",
                len, self.max_frame_len
            )));
        }

        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).await.map_err(map_eof)?;
        Ok(buf)
    }
}

#[async_trait::async_trait]
impl<R> FrameRead for FrameReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Vec<u8>> {
        match self.receive_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.read_frame())
                .await
                .map_err(|_| Error::Timeout("Receive"))?,
            None => self.read_frame().await,
        }
    }
}

/// Write half of a length-prefixed stream
pub struct FrameWriter<W> {
    inner: W,
    max_frame_len: usize,
    send_timeout: Option<Duration>,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            send_timeout: None,
        }
    }

    pub fn set_max_frame_len(&mut self, max_frame_len: usize) {
        self.max_frame_len = clamp_frame_len(max_frame_len);
    }

    pub fn set_send_timeout(&mut self, timeout: Option<Duration>) {
        self.send_timeout = timeout;
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.max_frame_len {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes (max {})",
                bytes.len(),
                self.max_frame_len
            )));
        }

        self.inner.write_u32(bytes.len() as u32).await?;
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W> FrameWrite for FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self.send_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.write_frame(bytes))
                .await
                .map_err(|_| Error::Timeout("Send"))?,
            None => self.write_frame(bytes).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_keep_their_boundaries() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let mut reader = FrameReader::new(b);

        writer.send(b"first").await.unwrap();
        writer.send(b"").await.unwrap();
        writer.send(b"third").await.unwrap();

        assert_eq!(reader.receive().await.unwrap(), b"first");
        assert_eq!(reader.receive().await.unwrap(), b"");
        assert_eq!(reader.receive().await.unwrap(), b"third");
    }

    #[tokio::test]
    async fn reader_rejects_frames_over_the_limit() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let mut reader = FrameReader::new(b);
        reader.set_max_frame_len(4);

        writer.send(b"too long").await.unwrap();

        match reader.receive().await {
            Err(Error::InvalidFrame(msg)) => assert!(msg.contains("too large")),
            other => panic!("Expected InvalidFrame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn frame_limit_never_exceeds_the_length_prefix() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let mut reader = FrameReader::new(b);

        writer.set_max_frame_len(usize::MAX);
        reader.set_max_frame_len(usize::MAX);
        assert_eq!(writer.max_frame_len, u32::MAX as usize);
        assert_eq!(reader.max_frame_len, u32::MAX as usize);

        writer.send(b"still fine").await.unwrap();
        assert_eq!(reader.receive().await.unwrap(), b"still fine");
    }

    #[tokio::test]
    async fn truncated_frame_reports_connection_closed() {
        let (mut a, b) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(b);

        a.write_u32(10).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        assert!(matches!(
            reader.receive().await,
            Err(Error::ConnectionClosed)
        ));
    }
}

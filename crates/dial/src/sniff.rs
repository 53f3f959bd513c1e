//! Non-consuming protocol sniffing.
//!
//! A sniff peeks at the first bytes the server sends and compares them to an
//! expected prefix. Nothing is read off the stream, so whoever ends up owning
//! the socket still sees the full banner.

use std::io;
use std::os::fd::AsRawFd;

use async_trait::async_trait;
use tokio::io::Interest;
use tokio::net::TcpStream;

use crate::error::ProbeError;

/// Every SSH 2.0 server opens with `SSH-2.0-...`.
pub const SSH_BANNER_PREFIX: &[u8] = b"SSH-2";

/// Check that a freshly connected stream is the service we want.
///
/// Implementations must not consume any application data.
#[async_trait]
pub trait Verify: Send + Sync {
    async fn verify(&self, stream: &TcpStream) -> Result<(), ProbeError>;
}

/// Compares the first bytes sent by the server to a fixed prefix.
#[derive(Debug, Clone)]
pub struct BannerSniff {
    expected: Vec<u8>,
}

impl BannerSniff {
    pub fn new(expected: impl Into<Vec<u8>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Sniff for an SSH 2.0 server.
    pub fn ssh() -> Self {
        Self::new(SSH_BANNER_PREFIX)
    }

    pub fn expected(&self) -> &[u8] {
        &self.expected
    }
}

impl Default for BannerSniff {
    fn default() -> Self {
        Self::ssh()
    }
}

#[async_trait]
impl Verify for BannerSniff {
    async fn verify(&self, stream: &TcpStream) -> Result<(), ProbeError> {
        let wanted = self.expected.len();
        let peer = peer_label(stream);
        let mut buf = vec![0u8; wanted];

        let got = peek_exact(stream, &mut buf)
            .await
            .map_err(|source| ProbeError::Peek {
                wanted,
                peer: peer.clone(),
                source,
            })?;

        if got < wanted {
            return Err(ProbeError::ShortRead { wanted, peer, got });
        }
        if buf != self.expected {
            return Err(ProbeError::Mismatch {
                wanted,
                peer,
                expected: String::from_utf8_lossy(&self.expected).into_owned(),
                got_hex: hex::encode(&buf),
            });
        }
        Ok(())
    }
}

/// Peek until `buf` is full or the peer stops sending.
///
/// Returns the number of bytes available. Anything short of `buf.len()`
/// means the peer closed its side before sending that much.
pub async fn peek_exact(stream: &TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    let fd = stream.as_raw_fd();
    loop {
        let ready = stream.ready(Interest::READABLE).await?;
        let closed = ready.is_read_closed();

        let result = stream.try_io(Interest::READABLE, || {
            let n = common::platform::peek(fd, buf)?;
            if n > 0 && n < buf.len() && !closed {
                // Partial banner; wait for more to arrive.
                return Err(io::ErrorKind::WouldBlock.into());
            }
            Ok(n)
        });

        match result {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
}

fn peer_label(stream: &TcpStream) -> String {
    stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown peer>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const BANNER: &[u8] = b"SSH-2.0-OpenSSH_9.6\r\n";

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    async fn verify(stream: &TcpStream) -> Result<(), ProbeError> {
        tokio::time::timeout(Duration::from_secs(5), BannerSniff::ssh().verify(stream))
            .await
            .expect("sniff hung")
    }

    #[tokio::test]
    async fn sniff_leaves_banner_readable() {
        let (mut client, mut server) = connected_pair().await;
        server.write_all(BANNER).await.unwrap();

        verify(&client).await.unwrap();

        let mut banner = vec![0u8; BANNER.len()];
        client.read_exact(&mut banner).await.unwrap();
        assert_eq!(banner, BANNER);
    }

    #[tokio::test]
    async fn sniff_waits_for_partial_banner() {
        let (client, mut server) = connected_pair().await;
        server.write_all(b"SS").await.unwrap();

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            server.write_all(b"H-2.0-x\r\n").await.unwrap();
            server
        });

        verify(&client).await.unwrap();
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn peer_close_before_prefix_is_short_read() {
        let (client, mut server) = connected_pair().await;
        server.write_all(b"SS").await.unwrap();
        drop(server);

        match verify(&client).await {
            Err(ProbeError::ShortRead { wanted, got, .. }) => {
                assert_eq!(wanted, 5);
                assert_eq!(got, 2);
            }
            other => panic!("expected short read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_close_is_short_read_of_nothing() {
        let (client, server) = connected_pair().await;
        drop(server);

        match verify(&client).await {
            Err(ProbeError::ShortRead { got, .. }) => assert_eq!(got, 0),
            other => panic!("expected short read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_protocol_is_mismatch_with_hex() {
        let (client, mut server) = connected_pair().await;
        server.write_all(b"HTTP/1.1 400 Bad Request\r\n").await.unwrap();

        let err = verify(&client).await.unwrap_err();
        match &err {
            ProbeError::Mismatch {
                wanted,
                expected,
                got_hex,
                ..
            } => {
                assert_eq!(*wanted, 5);
                assert_eq!(expected, "SSH-2");
                assert_eq!(got_hex, "485454502f");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(err.to_string().contains("wanted 'SSH-2'"), "{err}");
    }

    #[tokio::test]
    async fn ssh1_server_is_rejected() {
        let (client, mut server) = connected_pair().await;
        server.write_all(b"SSH-1.5-ancient\r\n").await.unwrap();

        assert!(matches!(
            verify(&client).await,
            Err(ProbeError::Mismatch { .. })
        ));
    }
}

use std::fmt;

use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::error::ProbeError;
use crate::sniff::Verify;
use crate::srv::SrvRecord;

/// A host and port to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address string accepted by [`TcpStream::connect`].
    fn connect_addr(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.host.as_str();
        if host.contains(':') && !host.starts_with('[') {
            write!(f, "[{host}]:{}", self.port)
        } else {
            write!(f, "{host}:{}", self.port)
        }
    }
}

impl From<&SrvRecord> for Target {
    fn from(record: &SrvRecord) -> Self {
        Self::new(record.target.clone(), record.port)
    }
}

/// Connect to `target` and, if given, run `verify` on the new stream.
///
/// The stream is returned only when both steps succeed; on a failed check it
/// is dropped (and closed) here.
pub async fn probe(target: &Target, verify: Option<&dyn Verify>) -> Result<TcpStream, ProbeError> {
    info!(target = %target, "trying to connect");
    let stream = TcpStream::connect(target.connect_addr())
        .await
        .map_err(|source| ProbeError::Connect {
            target: target.to_string(),
            source,
        })?;

    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    info!(target = %target, %peer, "connected");

    if let Some(verify) = verify {
        match verify.verify(&stream).await {
            Ok(()) => info!(target = %target, %peer, "sniff succeeded"),
            Err(err) => {
                warn!(target = %target, %peer, %err, "sniff failed");
                return Err(err);
            }
        }
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::BannerSniff;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn display_brackets_ipv6() {
        assert_eq!(Target::new("example.com.", 22).to_string(), "example.com.:22");
        assert_eq!(Target::new("::1", 2222).to_string(), "[::1]:2222");
        assert_eq!(Target::new("[::1]", 22).to_string(), "[::1]:22");
    }

    #[test]
    fn target_from_srv_record() {
        let record = SrvRecord::new(10, 5, 2222, "ssh.example.com.");
        assert_eq!(Target::from(&record), Target::new("ssh.example.com.", 2222));
    }

    #[tokio::test]
    async fn refused_port_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = probe(&Target::new("127.0.0.1", port), None).await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn no_verifier_skips_sniff() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // The server never sends anything.
        let server = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let stream = probe(&Target::new("127.0.0.1", port), None).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn verifier_runs_on_connected_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.write_all(b"SSH-2.0-test\r\n").await.unwrap();
            conn
        });

        let sniff = BannerSniff::ssh();
        let stream = probe(&Target::new("127.0.0.1", port), Some(&sniff)).await;
        assert!(stream.is_ok(), "{stream:?}");
        drop(server.await.unwrap());
    }
}

//! SRV-driven dialing with a direct-connection fallback.

use std::sync::Arc;

use race::{Race, RaceConfig, RaceObserver, TracingObserver};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{DialError, Result};
use crate::probe::{probe, Target};
use crate::sniff::{BannerSniff, Verify};
use crate::srv::{order_records, srv_name, SrvOrder, SrvResolver, SystemResolver};

pub const DEFAULT_SERVICE: &str = "ssh";
pub const DEFAULT_PROTO: &str = "tcp";
pub const DEFAULT_PORT: u16 = 22;

/// Everything that shapes a dial apart from the host itself.
#[derive(Debug, Clone)]
pub struct DialConfig {
    pub service: String,
    pub proto: String,
    pub race: RaceConfig,
    pub order: SrvOrder,
    /// Check each SRV candidate for an SSH banner before accepting it.
    pub sniff: bool,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            proto: DEFAULT_PROTO.to_string(),
            race: RaceConfig::default(),
            order: SrvOrder::default(),
            sniff: true,
        }
    }
}

pub struct Dialer {
    resolver: Arc<dyn SrvResolver>,
    config: DialConfig,
    observer: Arc<dyn RaceObserver>,
    verifier: Option<Arc<dyn Verify>>,
}

impl Dialer {
    /// A dialer using the system resolver and, when `config.sniff` is set,
    /// the SSH banner sniff.
    pub fn new(config: DialConfig) -> Self {
        Self::with_resolver(Arc::new(SystemResolver), config)
    }

    pub fn with_resolver(resolver: Arc<dyn SrvResolver>, config: DialConfig) -> Self {
        let verifier: Option<Arc<dyn Verify>> = if config.sniff {
            Some(Arc::new(BannerSniff::ssh()))
        } else {
            None
        };
        Self {
            resolver,
            config,
            observer: Arc::new(TracingObserver),
            verifier,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RaceObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the candidate check. `None` accepts any connection.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Option<Arc<dyn Verify>>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    /// Dial `host` through its SRV records, falling back to
    /// `host:fallback_port` only when the lookup itself fails.
    pub async fn dial(&self, host: &str, fallback_port: u16) -> Result<TcpStream> {
        match self.dial_srv(host).await {
            Err(DialError::Lookup(err)) => {
                warn!(%err, "fallback to non-SRV");
                self.dial_direct(host, fallback_port).await
            }
            other => other,
        }
    }

    /// Race connections to the SRV targets of `host`.
    pub async fn dial_srv(&self, host: &str) -> Result<TcpStream> {
        let name = srv_name(&self.config.service, &self.config.proto, host);
        let answer = self.resolver.lookup_srv(&name).await?;

        info!(name = %answer.name, "{} SRV records found", answer.records.len());
        for record in &answer.records {
            info!(
                priority = record.priority,
                weight = record.weight,
                target = %record.target,
                port = record.port,
                "resolved SRV record"
            );
        }

        let (available, unavailable): (Vec<_>, Vec<_>) = answer
            .records
            .into_iter()
            .partition(|record| !record.is_unavailable());
        if !unavailable.is_empty() {
            debug!(count = unavailable.len(), "dropping '.' SRV targets");
        }
        if available.is_empty() {
            return Err(DialError::Unavailable { name });
        }

        let ordered = order_records(available, self.config.order, &mut rand::thread_rng());
        let candidates: Vec<_> = ordered
            .iter()
            .map(|record| {
                let target = Target::from(record);
                let verifier = self.verifier.clone();
                move |_token: race::CancellationToken| async move {
                    probe(&target, verifier.as_deref()).await
                }
            })
            .collect();

        Race::new(self.config.race)
            .with_observer(Arc::clone(&self.observer))
            .run(candidates)
            .await
            .map_err(|source| DialError::Race { name, source })
    }

    /// Connect straight to `host:port` with no racing and no sniff, bounded
    /// by the race deadline.
    pub async fn dial_direct(&self, host: &str, port: u16) -> Result<TcpStream> {
        let target = Target::new(host, port);
        let after = self.config.race.deadline;
        info!(target = %target, "trying to connect");

        match tokio::time::timeout(after, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                info!(target = %target, "connected");
                Ok(stream)
            }
            Ok(Err(source)) => Err(DialError::Fallback {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(DialError::Timeout {
                target: target.to_string(),
                after,
            }),
        }
    }
}

//! SRV lookup and target ordering.
//!
//! An SRV answer lists `(priority, weight, port, target)` tuples. Lower
//! priority values are preferred; within one priority, RFC 2782 picks targets
//! at random in proportion to their weight.

use async_trait::async_trait;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use rand::Rng;
use tracing::debug;

use crate::error::LookupError;

/// One SRV resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Target host name as returned by the resolver (usually with a trailing
    /// dot).
    pub target: String,
}

impl SrvRecord {
    pub fn new(priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        Self {
            priority,
            weight,
            port,
            target: target.into(),
        }
    }

    /// A target of `.` means the service is decidedly not available at this
    /// domain.
    pub fn is_unavailable(&self) -> bool {
        self.target == "." || self.target.is_empty()
    }
}

/// The records found for one SRV name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvAnswer {
    /// The name that was queried.
    pub name: String,
    pub records: Vec<SrvRecord>,
}

/// Build the owner name `_service._proto.domain`.
///
/// With an empty service and protocol the domain is used verbatim.
pub fn srv_name(service: &str, proto: &str, domain: &str) -> String {
    if service.is_empty() && proto.is_empty() {
        return domain.to_string();
    }
    format!("_{service}._{proto}.{domain}")
}

/// Looks up SRV records.
#[async_trait]
pub trait SrvResolver: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> Result<SrvAnswer, LookupError>;
}

/// [`SrvResolver`] backed by `hickory-resolver` and the system resolver
/// configuration (`/etc/resolv.conf`).
///
/// A fresh resolver is built per lookup; nothing is cached across calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl SrvResolver for SystemResolver {
    async fn lookup_srv(&self, name: &str) -> Result<SrvAnswer, LookupError> {
        let (config, options) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| LookupError::new(name, e))?;
        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(options)
            .build();

        debug!(name, "querying SRV");
        let lookup = resolver
            .srv_lookup(name)
            .await
            .map_err(|e| LookupError::new(name, e))?;

        let records = lookup
            .iter()
            .map(|srv| SrvRecord::new(srv.priority(), srv.weight(), srv.port(), srv.target().to_string()))
            .collect();

        Ok(SrvAnswer {
            name: name.to_string(),
            records,
        })
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// How targets sharing a priority are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SrvOrder {
    /// RFC 2782 weighted random selection within each priority.
    #[default]
    Weighted,
    /// Keep the resolver's order within each priority.
    Listed,
}

/// Order records by ascending priority, breaking ties according to `order`.
pub fn order_records<R: Rng + ?Sized>(
    mut records: Vec<SrvRecord>,
    order: SrvOrder,
    rng: &mut R,
) -> Vec<SrvRecord> {
    records.sort_by_key(|r| r.priority);
    if order == SrvOrder::Listed {
        return records;
    }

    let mut ordered = Vec::with_capacity(records.len());
    for group in records.chunk_by(|a, b| a.priority == b.priority) {
        ordered.extend(weighted_shuffle(group.to_vec(), rng));
    }
    ordered
}

/// RFC 2782 selection: repeatedly pick a number in `0..=total_weight` and take
/// the first record whose running weight sum reaches it.
///
/// Zero-weight records are placed first so they keep a small chance of being
/// picked.
fn weighted_shuffle<R: Rng + ?Sized>(mut group: Vec<SrvRecord>, rng: &mut R) -> Vec<SrvRecord> {
    group.sort_by_key(|r| r.weight != 0);

    let mut ordered = Vec::with_capacity(group.len());
    while !group.is_empty() {
        let total: u32 = group.iter().map(|r| u32::from(r.weight)).sum();
        let pick = rng.gen_range(0..=total);

        let mut running = 0u32;
        let index = group
            .iter()
            .position(|r| {
                running += u32::from(r.weight);
                running >= pick
            })
            .unwrap_or(0);
        ordered.push(group.remove(index));
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn targets(records: &[SrvRecord]) -> Vec<&str> {
        records.iter().map(|r| r.target.as_str()).collect()
    }

    #[test]
    fn srv_name_prefixes_service_and_proto() {
        assert_eq!(srv_name("ssh", "tcp", "example.com"), "_ssh._tcp.example.com");
        assert_eq!(srv_name("", "", "_ssh._tcp.example.com"), "_ssh._tcp.example.com");
    }

    #[test]
    fn root_target_means_unavailable() {
        assert!(SrvRecord::new(0, 0, 0, ".").is_unavailable());
        assert!(!SrvRecord::new(0, 0, 22, "a.example.com.").is_unavailable());
    }

    #[test]
    fn listed_sorts_by_priority_and_keeps_resolver_order() {
        let records = vec![
            SrvRecord::new(20, 5, 22, "c."),
            SrvRecord::new(10, 1, 22, "a."),
            SrvRecord::new(20, 50, 22, "d."),
            SrvRecord::new(10, 99, 22, "b."),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let ordered = order_records(records, SrvOrder::Listed, &mut rng);
        assert_eq!(targets(&ordered), vec!["a.", "b.", "c.", "d."]);
    }

    #[test]
    fn weighted_never_crosses_priorities() {
        let records = vec![
            SrvRecord::new(2, 100, 22, "low-1."),
            SrvRecord::new(1, 1, 22, "high-1."),
            SrvRecord::new(2, 1, 22, "low-2."),
            SrvRecord::new(1, 100, 22, "high-2."),
            SrvRecord::new(3, 0, 22, "last."),
        ];
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ordered = order_records(records.clone(), SrvOrder::Weighted, &mut rng);
            let priorities: Vec<u16> = ordered.iter().map(|r| r.priority).collect();
            assert_eq!(priorities, vec![1, 1, 2, 2, 3], "seed {seed}");
        }
    }

    #[test]
    fn weighted_keeps_every_record() {
        let records: Vec<SrvRecord> = (0..8)
            .map(|i| SrvRecord::new(0, i * 10, 22, format!("host-{i}.")))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut ordered = order_records(records.clone(), SrvOrder::Weighted, &mut rng);
        ordered.sort_by_key(|r| r.weight);
        assert_eq!(ordered, records);
    }

    #[test]
    fn heavier_weight_usually_goes_first() {
        let records = vec![
            SrvRecord::new(0, 10, 22, "light."),
            SrvRecord::new(0, 90, 22, "heavy."),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let heavy_first = (0..1000)
            .filter(|_| {
                let ordered = order_records(records.clone(), SrvOrder::Weighted, &mut rng);
                ordered[0].target == "heavy."
            })
            .count();
        assert!(heavy_first > 800, "heavy first {heavy_first}/1000");
    }

    #[test]
    fn zero_weight_is_rarely_first() {
        let records = vec![
            SrvRecord::new(0, 100, 22, "weighted."),
            SrvRecord::new(0, 0, 22, "zero."),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let zero_first = (0..1000)
            .filter(|_| {
                let ordered = order_records(records.clone(), SrvOrder::Weighted, &mut rng);
                ordered[0].target == "zero."
            })
            .count();
        assert!(zero_first < 50, "zero first {zero_first}/1000");
    }

    #[test]
    fn all_zero_weights_keep_list_order() {
        let records = vec![
            SrvRecord::new(0, 0, 22, "a."),
            SrvRecord::new(0, 0, 22, "b."),
            SrvRecord::new(0, 0, 22, "c."),
        ];
        let mut rng = StdRng::seed_from_u64(9);
        let ordered = order_records(records, SrvOrder::Weighted, &mut rng);
        assert_eq!(targets(&ordered), vec!["a.", "b.", "c."]);
    }
}

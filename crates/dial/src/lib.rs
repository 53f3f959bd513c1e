//! Dialing SRV-located SSH servers.
//!
//! - [`srv`]: SRV lookup behind the [`SrvResolver`] trait, plus RFC 2782
//!   target ordering.
//! - [`sniff`]: non-consuming banner check ([`BannerSniff`]).
//! - [`probe`]: connect to one target and optionally verify it.
//! - [`dialer`]: ties them together, racing SRV targets through
//!   [`race::Race`] and falling back to a direct connection when the lookup
//!   fails.

pub mod dialer;
pub mod error;
pub mod probe;
pub mod sniff;
pub mod srv;

pub use dialer::{DialConfig, Dialer, DEFAULT_PORT, DEFAULT_PROTO, DEFAULT_SERVICE};
pub use error::{DialError, LookupError, ProbeError, Result};
pub use probe::{probe, Target};
pub use sniff::{BannerSniff, Verify, SSH_BANNER_PREFIX};
pub use srv::{order_records, srv_name, SrvAnswer, SrvOrder, SrvRecord, SrvResolver, SystemResolver};

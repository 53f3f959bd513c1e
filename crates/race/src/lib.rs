//! Staggered race over an ordered list of cancellable operations.
//!
//! Candidates are launched in list order, one per stagger interval. A
//! candidate that finishes (either way) before its interval is up lets the
//! next one start immediately. The first success wins, cancels everyone else
//! and is returned once every launched operation has wound down.
//!
//! ```ignore
//! use race::{Race, RaceConfig};
//!
//! let race = Race::new(RaceConfig::default());
//! let stream = race.run(candidates).await?;
//! ```

mod config;
mod error;
mod observer;
mod scheduler;

pub use config::{RaceConfig, DEFAULT_DEADLINE, DEFAULT_STAGGER};
pub use error::{BoxError, RaceError, Result};
pub use observer::{RaceObserver, TracingObserver};
pub use scheduler::{boxed, Candidate, Race};
pub use tokio_util::sync::CancellationToken;

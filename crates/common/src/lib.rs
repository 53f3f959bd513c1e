//! Shared pieces for srvdial: the top-level error type and the raw socket
//! calls (non-consuming peek, descriptor passing) the other crates build on.

#[cfg(not(unix))]
compile_error!("srvdial hands sockets over with SCM_RIGHTS and only supports Unix targets");

mod error;
pub mod handoff;
pub mod platform;

pub use error::Error;
pub use handoff::hand_off;
pub type Result<T> = std::result::Result<T, Error>;

//! Raw socket calls that the standard library and tokio do not expose.
//!
//! Everything here works on borrowed raw descriptors and never takes
//! ownership unless the return type says so ([`recv_fd`] hands back an
//! [`OwnedFd`](std::os::fd::OwnedFd)).

mod unix;

pub use unix::{peek, recv_fd, send_fd};

// ---------------------------------------------------------------------------
// Per-OS flags
// ---------------------------------------------------------------------------

/// Flags for `sendmsg` when handing a descriptor over.
///
/// Linux can suppress `SIGPIPE` per call; elsewhere the process default
/// applies.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) const SEND_FLAGS: libc::c_int = 0;

/// Flags for `recvmsg` when receiving a descriptor.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) const RECV_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) const RECV_FLAGS: libc::c_int = 0;

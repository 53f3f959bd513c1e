use std::os::fd::RawFd;

use thiserror::Error;

/// Failures while handing a socket over.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to switch socket {fd} to blocking mode: {source}")]
    Blocking { fd: RawFd, source: std::io::Error },

    #[error("failed handing socket {fd} to fd {channel}: sendmsg: {source}")]
    Handoff {
        fd: RawFd,
        channel: RawFd,
        source: std::io::Error,
    },
}

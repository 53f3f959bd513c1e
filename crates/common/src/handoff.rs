//! Handing an established socket to the parent process.

use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};

use tracing::debug;

use crate::platform;
use crate::{Error, Result};

/// Pass `stream` to whoever holds the other end of `channel`, then close our
/// copy.
///
/// The socket is switched back to blocking mode first: the receiver (an SSH
/// client using `ProxyUseFdPass`) inherits the descriptor's file status flags
/// and expects an ordinary blocking socket.
pub fn hand_off(stream: TcpStream, channel: RawFd) -> Result<()> {
    let fd = stream.as_raw_fd();

    stream
        .set_nonblocking(false)
        .map_err(|source| Error::Blocking { fd, source })?;

    platform::send_fd(channel, fd).map_err(|source| Error::Handoff {
        fd,
        channel,
        source,
    })?;

    debug!(fd, channel, "descriptor sent, closing local copy");
    drop(stream);
    Ok(())
}

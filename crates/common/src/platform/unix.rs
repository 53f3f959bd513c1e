//! Unix socket syscalls: `recv(MSG_PEEK)` and `SCM_RIGHTS` passing.

use std::io;
use std::mem;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::ptr;

use super::{RECV_FLAGS, SEND_FLAGS};

/// Size in bytes of the single descriptor carried by a control message.
const FD_LEN: libc::c_uint = mem::size_of::<RawFd>() as libc::c_uint;

/// Peek at pending bytes on a socket without consuming them.
///
/// The call never blocks: an empty receive queue surfaces as
/// [`io::ErrorKind::WouldBlock`]. `Ok(0)` means the peer has closed the
/// stream. A short count means only that many bytes are queued so far.
pub fn peek(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes for the
        // duration of the call.
        let n = unsafe {
            libc::recv(
                fd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                libc::MSG_PEEK | libc::MSG_DONTWAIT,
            )
        };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Control buffer sized and aligned for one `SCM_RIGHTS` descriptor.
///
/// Backed by `u64` words so the embedded `cmsghdr` is suitably aligned.
struct ControlBuf {
    words: Vec<u64>,
    len: usize,
}

impl ControlBuf {
    fn for_one_fd() -> Self {
        // SAFETY: CMSG_SPACE is a pure size computation.
        let len = unsafe { libc::CMSG_SPACE(FD_LEN) } as usize;
        Self {
            words: vec![0u64; len.div_ceil(mem::size_of::<u64>())],
            len,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut libc::c_void {
        self.words.as_mut_ptr().cast()
    }
}

/// Send `fd` over the Unix socket `channel` as ancillary data.
///
/// The message carries exactly one descriptor in a single `SCM_RIGHTS`
/// control message plus one dummy payload byte (`0x00`), which is what
/// OpenSSH's `ProxyUseFdPass` expects on the proxy command's stdout.
pub fn send_fd(channel: RawFd, fd: RawFd) -> io::Result<()> {
    let mut payload = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuf::for_one_fd();

    // SAFETY: an all-zero msghdr is a valid empty header on every Unix libc
    // (some carry private padding fields that must stay zero).
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr();
    msg.msg_controllen = control.len as _;

    // SAFETY: `msg` points at `control`, which is large enough for one
    // cmsghdr carrying one descriptor, so CMSG_FIRSTHDR is non-null and
    // CMSG_DATA is in bounds.
    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "control buffer too small for SCM_RIGHTS",
            ));
        }
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(FD_LEN) as _;
        ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>(), fd);
    }

    loop {
        // SAFETY: every pointer in `msg` refers to locals that outlive the call.
        let sent = unsafe { libc::sendmsg(channel, &msg, SEND_FLAGS) };
        if sent >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Receive one descriptor sent by [`send_fd`] from the Unix socket `channel`.
///
/// Blocks until a message arrives. The returned descriptor is owned by the
/// caller.
pub fn recv_fd(channel: RawFd) -> io::Result<OwnedFd> {
    let mut payload = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuf::for_one_fd();

    // SAFETY: see `send_fd`.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr();
    msg.msg_controllen = control.len as _;

    let received = loop {
        // SAFETY: every pointer in `msg` refers to locals that outlive the call.
        let n = unsafe { libc::recvmsg(channel, &mut msg, RECV_FLAGS) };
        if n >= 0 {
            break n;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    };

    if received == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "channel closed before a descriptor arrived",
        ));
    }
    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "control message truncated",
        ));
    }

    // SAFETY: recvmsg filled `control` and updated `msg_controllen`, so the
    // header walk stays inside the buffer.
    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null()
            || (*cmsg).cmsg_level != libc::SOL_SOCKET
            || (*cmsg).cmsg_type != libc::SCM_RIGHTS
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "message carried no SCM_RIGHTS descriptor",
            ));
        }
        let fd = ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>());
        Ok(OwnedFd::from_raw_fd(fd))
    }
}

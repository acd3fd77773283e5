//! Byte transport underneath a [`Connection`](super::Connection).
//!
//! The engine only needs three things beyond async reads: a single
//! non-blocking write attempt, a zero-timeout readability check and an
//! explicit close whose failure is observable.

use std::io;

use tokio::{io::AsyncRead, net::TcpStream};

/// A stream socket to an agent.
pub trait Transport: AsyncRead + Unpin {
    /// Attempt one write without waiting.
    ///
    /// Returns [`io::ErrorKind::WouldBlock`] when the socket cannot accept
    /// data right now.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying write.
    fn try_send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Return `true` if a read would not block.
    ///
    /// End of stream and socket errors count as readable so the next
    /// receive can report them.
    fn poll_readable(&self) -> bool;

    /// Release the socket, reporting any error from the close itself.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying close.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

impl Transport for TcpStream {
    fn try_send(&mut self, data: &[u8]) -> io::Result<usize> { self.try_write(data) }

    fn poll_readable(&self) -> bool {
        let mut byte = [std::mem::MaybeUninit::<u8>::uninit(); 1];
        match socket2::SockRef::from(self).peek(&mut byte) {
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => false,
            Ok(_) | Err(_) => true,
        }
    }

    #[cfg(unix)]
    fn close(self) -> io::Result<()> { close_fd(self.into_std()?.into()) }

    #[cfg(not(unix))]
    fn close(self) -> io::Result<()> {
        let stream = self.into_std()?;
        drop(stream);
        Ok(())
    }
}

/// Close `fd`, returning the error that dropping an
/// [`OwnedFd`](std::os::fd::OwnedFd) discards.
#[cfg(unix)]
fn close_fd(fd: std::os::fd::OwnedFd) -> io::Result<()> {
    use std::os::fd::IntoRawFd;

    let raw = fd.into_raw_fd();
    // SAFETY: `raw` was released from its `OwnedFd` above, so this is the
    // only close of the descriptor.
    if unsafe { libc::close(raw) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

//! Virtual network interface access.

use std::io;

/// Read buffer size for one interface packet.
pub const MTU: usize = 1500;

/// A tun-style packet device.
///
/// `recv` blocks until a packet arrives and returns `Ok(0)` once the
/// device is closed. `close` must release a reader blocked in `recv`;
/// fd-backed implementations get this by closing the descriptor.
pub trait TunInterface: Send + Sync {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn send(&self, packet: &[u8]) -> io::Result<usize>;
    fn close(&self);
}

#[cfg(unix)]
pub use fd::FdTun;

#[cfg(unix)]
mod fd {
    use std::io;
    use std::os::unix::io::RawFd;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::TunInterface;

    /// Adapter over an inherited tun descriptor.
    ///
    /// The process that established the interface passes the descriptor
    /// down; this type takes ownership and closes it exactly once.
    pub struct FdTun {
        fd: RawFd,
        closed: AtomicBool,
    }

    impl FdTun {
        /// Take ownership of `fd`.
        ///
        /// # Safety
        ///
        /// `fd` must be a valid open descriptor for a packet device, and
        /// nothing else may use or close it afterwards.
        pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
            Self {
                fd,
                closed: AtomicBool::new(false),
            }
        }
    }

    impl TunInterface for FdTun {
        fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            if self.closed.load(Ordering::Acquire) {
                return Ok(0);
            }
            // SAFETY: the fd stays open until close(); buf is a valid writable slice
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if self.closed.load(Ordering::Acquire) {
                    // close() raced the read; that is end-of-stream, not a failure
                    return Ok(0);
                }
                return Err(err);
            }
            Ok(n as usize)
        }

        fn send(&self, packet: &[u8]) -> io::Result<usize> {
            if self.closed.load(Ordering::Acquire) {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "interface closed",
                ));
            }
            // SAFETY: the fd stays open until close(); packet is a valid readable slice
            let n = unsafe { libc::write(self.fd, packet.as_ptr().cast(), packet.len()) };
            if n < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(n as usize)
        }

        fn close(&self) {
            if !self.closed.swap(true, Ordering::AcqRel) {
                // SAFETY: first close wins; the fd is ours and still open
                unsafe { libc::close(self.fd) };
            }
        }
    }

    impl Drop for FdTun {
        fn drop(&mut self) {
            self.close();
        }
    }
}

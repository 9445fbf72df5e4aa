//! Crate-wide error type.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors that cross the tunnel's public API.
///
/// Malformed or non-DNS packets are not errors; the parsers return
/// `None` and the caller drops the packet.
#[derive(Error, Debug)]
pub enum Error {
    /// The upstream resolver did not answer within the deadline.
    #[error("upstream resolver timed out after {0:?}")]
    UpstreamTimeout(Duration),

    /// Sending to or receiving from the upstream resolver failed.
    #[error("upstream I/O error: {0}")]
    Upstream(#[source] io::Error),

    /// Reading from or writing to the virtual interface failed.
    #[error("interface I/O error: {0}")]
    Interface(#[source] io::Error),

    /// `start` was called while the tunnel was already active.
    #[error("tunnel is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, Error>;

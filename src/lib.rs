//! Sinkhole - a DNS-filtering tunnel engine.
//!
//! Reads IPv4/UDP frames from a tun-style virtual interface, answers
//! blocked DNS queries locally with 0.0.0.0, and relays everything else
//! to an upstream resolver.

pub mod dns;
pub mod error;
pub mod filter;
pub mod packet;
pub mod stats;
pub mod tun;
pub mod tunnel;
pub mod upstream;

pub use error::{Error, Result};
pub use tunnel::{Tunnel, TunnelConfig, TunnelEvent, TunnelState};

//! Direct network access: TCP handshakes and the host's neighbor cache.

pub mod neighbors;
pub mod tcp;

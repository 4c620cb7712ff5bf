//! Error types for the μDCN implementation.

use thiserror::Error;

/// All possible errors that can occur within the μDCN implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),
    
    /// Error related to NDN packet processing.
    #[error("NDN packet error: {0}")]
    NdnPacket(String),
    
    /// Error related to QUIC transport.
    #[error("QUIC transport error: {0}")]
    QuicTransport(String),
    
    /// Error raised by the Content Store.
    #[error("content store error: {0}")]
    Cs(String),

    /// Error raised by the Pending Interest Table.
    #[error("PIT error: {0}")]
    Pit(String),

    /// Error raised by the Forwarding Information Base.
    #[error("FIB error: {0}")]
    Fib(String),

    /// Error raised by the session overlay.
    #[error("session error: {0}")]
    Session(String),

    /// Error raised while loading or validating configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}

//! Error types for u64stream

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// u64stream error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (sockets, files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// User palette string did not match the required format
    #[error("Invalid palette format: {0}")]
    InvalidFormat(String),

    /// Datagram too short, too long, or with out-of-range fields
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Host name could not be resolved to an address
    #[error("Cannot resolve host '{0}'")]
    HostResolution(String),

    /// Command channel send/receive failed
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Operation requires a device host and none was configured
    #[error("No device host configured")]
    NoHost,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

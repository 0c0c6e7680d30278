use thiserror::Error;

/// Endpoint-fatal conditions: anything that aborts the sender or receiver
/// process outright, as opposed to `PacketError`, which only ever drops a
/// single datagram.
#[derive(Error, Debug)]
pub enum RdtError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake with {addr} did not complete")]
    HandshakeFailed { addr: std::net::SocketAddr },

    #[error("file I/O error on {path}: {source}")]
    FileIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RdtError>;

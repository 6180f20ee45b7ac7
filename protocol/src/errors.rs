use crate::state::ConnectionState;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
};

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug)]
pub enum ProtocolError {
    InvalidConfiguration(&'static str),
    UnknownCongestionControl(String),
    InvalidState(ConnectionState),
    UnsupportedSnapshotVersion(u8),
    ChecksumMismatch,
    CorruptSnapshot(&'static str),
    IOError(io::Error),
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ProtocolError::InvalidConfiguration(s) => write!(f, "Invalid Configuration: {}", s),
            ProtocolError::UnknownCongestionControl(name) => write!(
                f,
                "The requested congestion control mechanism ({}) is not implemented.",
                name
            ),
            ProtocolError::InvalidState(state) => write!(
                f,
                "The operation is not allowed while the connection is in state {}.",
                state
            ),
            ProtocolError::UnsupportedSnapshotVersion(version) => {
                write!(f, "Unsupported session snapshot version {}.", version)
            }
            ProtocolError::ChecksumMismatch => {
                write!(f, "The session snapshot checksum does not match its contents.")
            }
            ProtocolError::CorruptSnapshot(s) => write!(f, "Corrupt session snapshot: {}", s),
            ProtocolError::IOError(e) => write!(f, "An IO Error occurred. Reason: {:?}.", e),
        }
    }
}

impl Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
    fn from(inner: io::Error) -> ProtocolError {
        ProtocolError::IOError(inner)
    }
}

impl PartialEq for ProtocolError {
    fn eq(&self, other: &ProtocolError) -> bool {
        match (self, other) {
            (ProtocolError::InvalidConfiguration(_), ProtocolError::InvalidConfiguration(_)) => {
                true
            }
            (
                ProtocolError::UnknownCongestionControl(_),
                ProtocolError::UnknownCongestionControl(_),
            ) => true,
            (ProtocolError::InvalidState(a), ProtocolError::InvalidState(b)) => a == b,
            (
                ProtocolError::UnsupportedSnapshotVersion(a),
                ProtocolError::UnsupportedSnapshotVersion(b),
            ) => a == b,
            (ProtocolError::ChecksumMismatch, ProtocolError::ChecksumMismatch) => true,
            (ProtocolError::CorruptSnapshot(_), ProtocolError::CorruptSnapshot(_)) => true,
            (ProtocolError::IOError(_), ProtocolError::IOError(_)) => true,
            (_, _) => false,
        }
    }
}

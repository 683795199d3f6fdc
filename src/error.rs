use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Json(serde_json::Error),
    Protocol(String),
    Timeout,
    Io(std::io::Error),
    NotConnected,
    UnknownDevice(i64),
    UnsupportedDevice { device_id: i64, device_type: u8 },
    /// Login rejected or unreachable. Fatal for the account's startup.
    Authentication { account: String, source: Box<Error> },
    /// Device listing failed. Fatal for the account's startup.
    Discovery { account: String, source: Box<Error> },
    /// A poll cycle failed. Absorbed by the poller, surfaced as an event.
    Poll { device_id: i64, source: Box<Error> },
    /// A command POST failed. Returned to the caller and surfaced as an event.
    Command { device_id: i64, source: Box<Error> },
}

impl Error {
    /// True when the provider rejected the session token (HTTP 401/403),
    /// possibly wrapped in one of the taxonomy variants.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Status { status, .. } => matches!(status, 401 | 403),
            Error::Http(e) => e
                .status()
                .is_some_and(|s| s.as_u16() == 401 || s.as_u16() == 403),
            Error::Authentication { source, .. }
            | Error::Discovery { source, .. }
            | Error::Poll { source, .. }
            | Error::Command { source, .. } => source.is_unauthorized(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { status, body } if body.is_empty() => write!(f, "HTTP status {status}"),
            Error::Status { status, body } => write!(f, "HTTP status {status}: {body}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::NotConnected => write!(f, "not connected"),
            Error::UnknownDevice(id) => write!(f, "unknown device: {id}"),
            Error::UnsupportedDevice { device_id, device_type } => {
                write!(f, "device {device_id} has unsupported type {device_type}")
            }
            Error::Authentication { account, source } => {
                write!(f, "authentication failed for {account}: {source}")
            }
            Error::Discovery { account, source } => {
                write!(f, "device discovery failed for {account}: {source}")
            }
            Error::Poll { device_id, source } => {
                write!(f, "poll failed for device {device_id}: {source}")
            }
            Error::Command { device_id, source } => {
                write!(f, "command failed for device {device_id}: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Authentication { source, .. }
            | Error::Discovery { source, .. }
            | Error::Poll { source, .. }
            | Error::Command { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

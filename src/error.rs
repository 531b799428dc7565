use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    /// Requested attribute-tree key absent from the response. Expected for
    /// sparse, mode-dependent fields; handled per-field by the poll cycle.
    KeyNotFound(String),
    /// Write acknowledged with a status code other than 2000/2004.
    UnexpectedResponseCode(u16),
    Protocol(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::KeyNotFound(key) => write!(f, "key not found: {key}"),
            Error::UnexpectedResponseCode(code) => {
                write!(f, "unexpected response code: {code}")
            }
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

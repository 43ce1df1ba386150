use std::fmt;

use thiserror::Error;

/// Everything that can go wrong between receiving an image and producing
/// category percentages.
#[derive(Error, Debug)]
pub enum Error {
    /// The inference server, an image URL or the classification server
    /// could not be reached.
    #[error("{0}")]
    Connectivity(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("cannot identify image: {0}")]
    Format(#[from] image::ImageError),

    /// The inference server answered, but not with a usable document.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The inference server answered with a well-formed document that breaks
    /// the prediction contract (wrong length, NaN scores, ...).
    #[error("inference contract violation: {0}")]
    ContractViolation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    Io,
    Format,
    Inference,
    ContractViolation,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::Inference => "inference",
            ErrorKind::ContractViolation => "contract_violation",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connectivity(_) => ErrorKind::Connectivity,
            Error::Io(_) => ErrorKind::Io,
            Error::Format(_) => ErrorKind::Format,
            Error::Inference(_) => ErrorKind::Inference,
            Error::ContractViolation(_) => ErrorKind::ContractViolation,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Classify a `reqwest` failure. Transport problems (refused connection,
    /// DNS, timeouts) are connectivity errors, everything else means the
    /// peer answered with something we could not use.
    pub(crate) fn from_transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Error::Connectivity(format!("{}: {}", context, err))
        } else {
            Error::Inference(format!("{}: {}", context, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_snake_case() {
        let err = Error::ContractViolation("expected 10 scores, got 3".into());
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert_eq!(err.kind().as_str(), "contract_violation");
        assert_eq!(
            err.to_string(),
            "inference contract violation: expected 10 scores, got 3"
        );
    }

    #[test]
    fn io_errors_keep_their_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "No such file or directory");
    }
}

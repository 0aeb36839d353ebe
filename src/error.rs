//! Errors that can be returned by this crate

use thiserror::Error;

/// The broad family an error belongs to, so that callers can decide between defaulting and rejecting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedTemporalValue,
    InvalidNumericField,
    StructuralInvariantViolation,
    UnknownComponentType,
    UnknownTimezone,
    Serialization,
    TransportFailure,
}

#[derive(Debug, Error)]
pub enum PollError {
    /// A date or date-time property value that cannot be understood
    #[error("malformed date/time value {value:?}: {reason}")]
    MalformedTemporalValue { value: String, reason: String },

    /// A form field that should hold a number (hours, minutes, interval...) but does not
    #[error("invalid value {value:?} for numeric field `{field}`")]
    InvalidNumericField { field: &'static str, value: String },

    /// The calendar data does not have the shape an operation requires
    #[error("{0}")]
    StructuralInvariantViolation(String),

    #[error("unknown component type {0:?}")]
    UnknownComponentType(String),

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),

    #[error("invalid jCal data: {0}")]
    Serialization(String),

    /// A network collaborator failed. `status` is the HTTP status, if any was received
    #[error("transport failure{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    TransportFailure { status: Option<u16>, message: String },
}

impl PollError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::MalformedTemporalValue { .. } => ErrorKind::MalformedTemporalValue,
            PollError::InvalidNumericField { .. } => ErrorKind::InvalidNumericField,
            PollError::StructuralInvariantViolation(_) => ErrorKind::StructuralInvariantViolation,
            PollError::UnknownComponentType(_) => ErrorKind::UnknownComponentType,
            PollError::UnknownTimezone(_) => ErrorKind::UnknownTimezone,
            PollError::Serialization(_) => ErrorKind::Serialization,
            PollError::TransportFailure { .. } => ErrorKind::TransportFailure,
        }
    }

    pub(crate) fn structure<S: Into<String>>(message: S) -> Self {
        PollError::StructuralInvariantViolation(message.into())
    }

    pub(crate) fn transport<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        PollError::TransportFailure { status, message: message.into() }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(err: serde_json::Error) -> Self {
        PollError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        PollError::TransportFailure {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for PollError {
    fn from(err: url::ParseError) -> Self {
        PollError::TransportFailure { status: None, message: format!("invalid URL: {}", err) }
    }
}

pub type Result<T> = std::result::Result<T, PollError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        let err = PollError::structure("Must have at least 1 voter");
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
        assert_eq!(err.to_string(), "Must have at least 1 voter");

        let err = PollError::transport(Some(412), "Precondition Failed");
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(err.to_string(), "transport failure (HTTP 412): Precondition Failed");

        let err = PollError::transport(None, "connection refused");
        assert_eq!(err.to_string(), "transport failure: connection refused");
    }
}

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

use std::fmt;

/// Result type with custom Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error information
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// Type of error and additional information
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub error_type: ErrorType,

    /// Where this error occurred
    pub location: String,
}

/// Possible error types
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    // ? Resolution errors
    InvalidEndpoint {
        reason: String,
    },

    // ? Transport errors
    TransportError {
        message: String,
    },
    MissingStatusCode,
    Abandoned,

    // ? Coordinator errors
    ProviderUnavailable,
    MaxInFlight {
        max: usize,
    },

    // ? General errors
    InternalError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::InvalidEndpoint { reason } => write!(f, "Invalid endpoint: {reason}"),
            ErrorType::TransportError { message } => write!(f, "Transport error: {message}"),
            ErrorType::MissingStatusCode => {
                write!(f, "Response carried a payload but no status code")
            }
            ErrorType::Abandoned => write!(f, "Request was dropped before it completed"),
            ErrorType::ProviderUnavailable => write!(f, "Provider is no longer available"),
            ErrorType::MaxInFlight { max } => {
                write!(f, "Max number of requests in flight reached ({max})")
            }
            ErrorType::InternalError => write!(f, "Internal error"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.error_type, self.location)
    }
}

impl std::error::Error for Error {}

#[macro_export]
macro_rules! create_error {
    ( $error: ident $( $tt:tt )? ) => {
        $crate::Error {
            error_type: $crate::ErrorType::$error $( $tt )?,
            location: format!("{}:{}:{}", file!(), line!(), column!()),
        }
    };
}

#[macro_export]
macro_rules! create_transport_error {
    ( $message: expr ) => {
        $crate::create_error!(TransportError {
            message: $message.to_string()
        })
    };
}

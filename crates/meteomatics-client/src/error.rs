//! Error types for the Meteomatics client

use std::fmt;
use std::sync::Arc;

/// A bearer token whose embedded claims cannot be read
#[derive(Debug)]
pub enum TokenError {
    /// Not a JWT, or its payload has no numeric `exp` claim
    Decode(jsonwebtoken::errors::Error),
    /// `exp` cannot be represented as a timestamp
    ExpiryOutOfRange(f64),
    /// Token was already expired when it was handed out
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "Token claims unreadable: {e}"),
            Self::ExpiryOutOfRange(exp) => write!(f, "Token expiry out of range: {exp}"),
            Self::Expired => write!(f, "Token already expired"),
        }
    }
}

impl std::error::Error for TokenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Decode(e)
    }
}

/// Errors from a single call to a Meteomatics endpoint
#[derive(Debug)]
pub enum ClientError {
    /// Request could not be sent or the response could not be read
    Http(reqwest::Error),
    /// Endpoint answered with a non-success status
    Status(u16),
    /// Endpoint handed out a token we cannot decode
    Token(TokenError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Status(status) => write!(f, "Meteomatics returned status {status}"),
            Self::Token(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Token(e) => Some(e),
            Self::Status(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<TokenError> for ClientError {
    fn from(e: TokenError) -> Self {
        Self::Token(e)
    }
}

/// Terminal failure to obtain a valid bearer token.
///
/// Cloneable so every caller waiting on the same failed refresh gets it.
#[derive(Debug, Clone)]
pub enum AuthError {
    Exhausted {
        attempts: u32,
        last_error: Arc<ClientError>,
    },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "Authentication failed after {attempts} attempts: {last_error}"
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error.as_ref()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

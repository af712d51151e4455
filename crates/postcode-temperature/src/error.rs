//! Error types for the postcode temperature service

use std::fmt;

/// A stored hash that does not decode into a lookup result
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    MissingField(&'static str),
    InvalidStatus(String),
    InvalidTemperature(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MissingField(field) => write!(f, "Missing field: {}", field),
            CodecError::InvalidStatus(value) => write!(f, "Invalid status: {:?}", value),
            CodecError::InvalidTemperature(value) => {
                write!(f, "Invalid temperature: {:?}", value)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Failures talking to the cache backend
#[derive(Debug)]
pub enum StoreError {
    Redis(redis::RedisError),
    Codec(CodecError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Redis(err) => write!(f, "Redis error: {}", err),
            StoreError::Codec(err) => write!(f, "Cache record error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Redis(err) => Some(err),
            StoreError::Codec(err) => Some(err),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Redis(err)
    }
}

impl From<CodecError> for StoreError {
    fn from(err: CodecError) -> Self {
        StoreError::Codec(err)
    }
}

/// Startup and process-level errors
#[derive(Debug)]
pub enum ServiceError {
    Config(String),
    Store(StoreError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServiceError::Store(err) => write!(f, "Cache store error: {}", err),
            ServiceError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Store(err) => Some(err),
            ServiceError::Io(err) => Some(err.as_ref()),
            ServiceError::Config(_) => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Store(err)
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(err: redis::RedisError) -> Self {
        ServiceError::Store(StoreError::Redis(err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServiceError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServiceError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

//! Mapping between lookup results and the string-only hash stored per key
//!
//! Hash fields have no null type, so an absent temperature is written as the
//! empty string and read back as absent, never as zero.

use std::collections::HashMap;

use meteomatics_client::LookupResult;

use crate::error::CodecError;

pub const STATUS_FIELD: &str = "status";
pub const TEMP_FIELD: &str = "temp";

/// A lookup result as stored in the cache backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub status: String,
    pub temp: String,
}

impl CacheRecord {
    pub fn to_fields(&self) -> [(&'static str, String); 2] {
        [
            (STATUS_FIELD, self.status.clone()),
            (TEMP_FIELD, self.temp.clone()),
        ]
    }

    /// Build a record from a full hash read. A missing `temp` reads as absent.
    pub fn from_fields(mut fields: HashMap<String, String>) -> Result<Self, CodecError> {
        let status = fields
            .remove(STATUS_FIELD)
            .ok_or(CodecError::MissingField(STATUS_FIELD))?;
        let temp = fields.remove(TEMP_FIELD).unwrap_or_default();
        Ok(Self { status, temp })
    }
}

pub fn encode(result: &LookupResult) -> CacheRecord {
    CacheRecord {
        status: result.status.to_string(),
        temp: result
            .temperature
            .map(|t| t.to_string())
            .unwrap_or_default(),
    }
}

/// The postal code is the store key, not a stored field, so the caller
/// supplies it back.
pub fn decode(postal_code: &str, record: &CacheRecord) -> Result<LookupResult, CodecError> {
    let status = record
        .status
        .parse::<u16>()
        .map_err(|_| CodecError::InvalidStatus(record.status.clone()))?;

    let temperature = if record.temp.is_empty() {
        None
    } else {
        match record.temp.parse::<f64>() {
            Ok(t) if t.is_finite() => Some(t),
            _ => return Err(CodecError::InvalidTemperature(record.temp.clone())),
        }
    };

    Ok(LookupResult {
        postal_code: postal_code.to_string(),
        status,
        temperature,
    })
}

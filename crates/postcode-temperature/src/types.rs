//! Wire types for the HTTP layer

use serde::{Deserialize, Serialize};

/// Body of a postal code lookup response. `temp` is left out when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostCodeResponse {
    #[serde(rename = "postCode")]
    pub post_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
}

/// Statistics about the lookup cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_code_response_with_temp() {
        let response = PostCodeResponse {
            post_code: "12345".to_string(),
            temp: Some(7.5),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"postCode":"12345","temp":7.5}"#);
    }

    #[test]
    fn test_post_code_response_omits_absent_temp() {
        let response = PostCodeResponse {
            post_code: "1234".to_string(),
            temp: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"postCode":"1234"}"#);
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 3600,
            cache: CacheStats {
                hits: 500,
                misses: 50,
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"uptime_secs\":3600"));
        assert!(json.contains("\"hits\":500"));
    }
}

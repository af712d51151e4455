use serde::Deserialize;

/// Outcome of a temperature lookup for one postal code.
///
/// `status` is an HTTP-style code: 200 on success, the upstream status on an
/// upstream HTTP error, 500 when the failure could not be classified.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub postal_code: String,
    pub status: u16,
    pub temperature: Option<f64>,
}

impl LookupResult {
    pub fn success(postal_code: &str, temperature: f64) -> Self {
        Self {
            postal_code: postal_code.to_string(),
            status: 200,
            temperature: Some(temperature),
        }
    }

    pub fn failure(postal_code: &str, status: u16) -> Self {
        Self {
            postal_code: postal_code.to_string(),
            status,
            temperature: None,
        }
    }
}

/// Response from the login endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

/// Claims we read from the token payload
#[derive(Debug, Deserialize)]
pub(crate) struct TokenClaims {
    pub exp: f64,
}

/// Response from the `/now/{parameter}/{location}/json` endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct WeatherResponse {
    pub data: Vec<ParameterSeries>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParameterSeries {
    pub coordinates: Vec<CoordinateSeries>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoordinateSeries {
    pub dates: Vec<DatedValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DatedValue {
    pub value: f64,
}

impl WeatherResponse {
    /// The first reading of the first parameter at the first coordinate
    pub fn first_value(&self) -> Option<f64> {
        self.data
            .first()?
            .coordinates
            .first()?
            .dates
            .first()
            .map(|d| d.value)
    }
}

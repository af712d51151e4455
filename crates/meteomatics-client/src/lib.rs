//! Rust client for the [Meteomatics](https://www.meteomatics.com/) weather API
//!
//! Meteomatics authenticates API calls with a short-lived bearer token that is
//! obtained from a separate login endpoint using Basic credentials. This crate
//! owns that token's lifecycle and exposes a single temperature query keyed by
//! German postal code.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meteomatics_client::{IdentityClient, TokenManager, WeatherClient};
//!
//! # async fn example() -> Result<(), meteomatics_client::AuthError> {
//! let identity = IdentityClient::new("user", "secret");
//! let tokens = TokenManager::new(Arc::new(identity));
//! let weather = WeatherClient::new();
//!
//! let token = tokens.ensure_valid_token().await?;
//! let result = weather.fetch_temperature("10115", &token).await;
//! println!("{} -> {:?}", result.status, result.temperature);
//! # Ok(())
//! # }
//! ```

mod error;
mod identity;
mod token;
mod types;
mod weather;

pub use error::{AuthError, ClientError, Result, TokenError};
pub use identity::IdentityClient;
pub use token::{AccessToken, IdentityProvider, RetryPolicy, TokenManager, TokenSource};
pub use types::LookupResult;
pub use weather::{TemperatureSource, WeatherClient};

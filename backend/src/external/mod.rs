//! External API integrations

pub mod weather;

pub use weather::{ProviderObservation, WeatherAdapter, WeatherApiClient};

use async_trait::async_trait;
use cw_core::geo::Coordinates;
use cw_core::{Error, Result, TARGET_INGEST};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::Geocoder;

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn first_match(location: &str, response: GeocodeResponse) -> Result<Option<Coordinates>> {
    match response.status.as_str() {
        "OK" | "ZERO_RESULTS" => {}
        status => {
            return Err(Error::Geocoding(format!(
                "{} for {:?}: {}",
                status,
                location,
                response.error_message.unwrap_or_default()
            )))
        }
    }
    match response.results.into_iter().next() {
        Some(result) => Ok(Some(Coordinates::new(
            result.geometry.location.lat,
            result.geometry.location.lng,
        ))),
        None => {
            warn!(target: TARGET_INGEST, "No results found for location: {}", location);
            Ok(None)
        }
    }
}

/// Google Geocoding API, first result wins.
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Geocoding("GOOGLE_GEOCODING_API_KEY is not set".to_string()))?;
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }
}

impl fmt::Debug for GoogleGeocoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleGeocoder")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>> {
        let location = location.trim();
        if location.is_empty() || location == "Unknown" {
            return Ok(None);
        }
        debug!(target: TARGET_INGEST, "Geocoding {:?}", location);

        let response = self
            .client
            .get(GEOCODE_URL)
            .query(&[("address", location), ("key", self.api_key.as_str())])
            .send()
            .await?
            .json::<GeocodeResponse>()
            .await?;

        first_match(location, response)
    }
}

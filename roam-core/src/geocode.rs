//! Nominatim geocoding client.

use crate::types::Location;
use roam_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("roam-travel-assistant/", env!("CARGO_PKG_VERSION"));

/// Geocoding client over the Nominatim search API.
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
}

impl Geocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look up a location name.
    ///
    /// Takes the first (most relevant) result without disambiguation.
    /// Returns `Ok(None)` when Nominatim has no match; errors cover network
    /// failures, timeouts, and malformed payloads.
    pub async fn lookup(&self, query: &str) -> Result<Option<Location>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .timeout(GEOCODE_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Geocode(format!("request for '{query}' failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Geocode(format!(
                "nominatim returned {} for '{query}'",
                status.as_u16()
            )));
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .map_err(|e| Error::Geocode(format!("malformed response for '{query}': {e}")))?;

        let Some(first) = results.into_iter().next() else {
            return Ok(None);
        };

        let lat = first
            .lat
            .parse::<f64>()
            .map_err(|e| Error::Geocode(format!("bad latitude '{}': {e}", first.lat)))?;
        let lon = first
            .lon
            .parse::<f64>()
            .map_err(|e| Error::Geocode(format!("bad longitude '{}': {e}", first.lon)))?;

        Ok(Some(Location {
            name: query.to_string(),
            lat,
            lon,
            display_name: Some(first.display_name),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn lookup_takes_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Paris"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "lat": "48.8566", "lon": "2.3522", "display_name": "Paris, France" }
            ])))
            .mount(&server)
            .await;

        let geocoder = Geocoder::new(&server.uri());
        let location = geocoder.lookup("Paris").await.unwrap().unwrap();
        assert_eq!(location.name, "Paris");
        assert!((location.lat - 48.8566).abs() < 1e-9);
        assert!((location.lon - 2.3522).abs() < 1e-9);
        assert_eq!(location.display_name.as_deref(), Some("Paris, France"));
    }

    #[tokio::test]
    async fn lookup_empty_results_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let geocoder = Geocoder::new(&server.uri());
        assert!(geocoder.lookup("Xyzzyville").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_server_error_is_geocode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let geocoder = Geocoder::new(&server.uri());
        let err = geocoder.lookup("Paris").await.unwrap_err();
        assert!(matches!(err, Error::Geocode(_)));
    }
}

//! Tourist attraction lookup over the Overpass API, with LLM-suggested
//! supplements and the same cache-first shape as the weather service.

use crate::llm::LlmClient;
use crate::sessions::KeyedLocks;
use crate::store::{cache_key, CacheDomain, Store};
use crate::types::Place;
use roam_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const SEARCH_RADIUS_M: u32 = 5000;
const MAX_PLACES: usize = 50;

/// Accommodation categories the tourism query drags in but a sightseeing
/// answer should not contain.
const EXCLUDED_TOURISM: &[&str] = &[
    "hotel",
    "hostel",
    "guest_house",
    "apartment",
    "motel",
    "chalet",
];

/// Categories worth surfacing first, in order.
const PRIORITY_CATEGORIES: &[&str] = &[
    "historic",
    "museum",
    "religious site",
    "attraction",
    "viewpoint",
    "artwork",
];

pub struct PlacesService {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn Store>,
    flights: Arc<KeyedLocks>,
    llm: LlmClient,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: Option<OverpassTags>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OverpassTags {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "name:en")]
    name_en: Option<String>,
    #[serde(default)]
    tourism: Option<String>,
    #[serde(default)]
    historic: Option<String>,
    #[serde(default)]
    amenity: Option<String>,
}

impl PlacesService {
    pub fn new(
        base_url: &str,
        store: Arc<dyn Store>,
        flights: Arc<KeyedLocks>,
        llm: LlmClient,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            flights,
            llm,
        }
    }

    /// Attractions around a point: cached when fresh, fetched otherwise.
    /// When the location's name is known, the Overpass result is padded
    /// with LLM-suggested attractions for that name.
    pub async fn get(&self, lat: f64, lon: f64, name: Option<&str>) -> Result<Vec<Place>> {
        if let Some(places) = self.cached(lat, lon).await {
            tracing::info!(lat, lon, "Places cache hit");
            return Ok(places);
        }

        let key = cache_key(CacheDomain::Places, lat, lon);
        let _guard = self.flights.acquire(&key).await;

        if let Some(places) = self.cached(lat, lon).await {
            tracing::debug!(lat, lon, "Places filled by concurrent fetch");
            return Ok(places);
        }

        tracing::info!(lat, lon, "Places cache miss, calling Overpass");
        let mut places = self.fetch(lat, lon).await?;

        if let Some(name) = name {
            self.supplement(name, lat, lon, &mut places).await;
        }
        places.truncate(MAX_PLACES);

        match serde_json::to_value(&places) {
            Ok(payload) => {
                if let Err(e) = self
                    .store
                    .cache_put(CacheDomain::Places, lat, lon, &payload)
                    .await
                {
                    tracing::warn!("Places cache write failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("Place list not serializable for cache: {}", e),
        }

        Ok(places)
    }

    async fn cached(&self, lat: f64, lon: f64) -> Option<Vec<Place>> {
        let payload = match self.store.cache_get(CacheDomain::Places, lat, lon).await {
            Ok(payload) => payload?,
            Err(e) => {
                tracing::warn!("Places cache read failed: {}", e);
                return None;
            }
        };
        serde_json::from_value(payload).ok()
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<Vec<Place>> {
        let url = format!("{}/api/interpreter", self.base_url);
        let query = overpass_query(lat, lon);
        let response = self
            .client
            .post(&url)
            .form(&[("data", query.as_str())])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::fetch("places", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(
                "places",
                format!("overpass returned {}", status.as_u16()),
            ));
        }

        let raw: OverpassResponse = response
            .json()
            .await
            .map_err(|e| Error::fetch("places", format!("malformed response: {e}")))?;

        Ok(collect_places(raw))
    }

    /// Pad the Overpass result with LLM suggestions; failures are logged
    /// and the fetched list stands on its own.
    async fn supplement(&self, name: &str, lat: f64, lon: f64, places: &mut Vec<Place>) {
        let existing: Vec<String> = places.iter().map(|p| p.name.clone()).collect();
        match self.llm.suggest_attractions(name, &existing).await {
            Ok(suggestions) => {
                let known: HashSet<String> =
                    existing.iter().map(|n| n.to_lowercase()).collect();
                for suggestion in suggestions {
                    if known.contains(&suggestion.to_lowercase()) {
                        continue;
                    }
                    places.push(Place {
                        name: suggestion,
                        category: "recommendation".to_string(),
                        lat,
                        lon,
                    });
                }
            }
            Err(e) => tracing::warn!("Attraction suggestions unavailable: {}", e),
        }
    }
}

fn overpass_query(lat: f64, lon: f64) -> String {
    format!(
        "[out:json][timeout:15];\n(\n  node[\"tourism\"](around:{r},{lat},{lon});\n  way[\"tourism\"](around:{r},{lat},{lon});\n  node[\"historic\"](around:{r},{lat},{lon});\n  way[\"historic\"](around:{r},{lat},{lon});\n);\nout center 20;",
        r = SEARCH_RADIUS_M,
    )
}

/// Named, non-accommodation elements, de-duplicated case-insensitively and
/// sorted so the interesting categories come first.
fn collect_places(raw: OverpassResponse) -> Vec<Place> {
    let mut seen = HashSet::new();
    let mut places = Vec::new();

    for element in raw.elements {
        let tags = match element.tags {
            Some(tags) => tags,
            None => continue,
        };
        let name = match tags.name_en.as_deref().or(tags.name.as_deref()) {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => continue,
        };
        if let Some(tourism) = tags.tourism.as_deref() {
            if EXCLUDED_TOURISM.contains(&tourism) {
                continue;
            }
        }
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        let (lat, lon) = match (element.lat, element.lon, element.center) {
            (Some(lat), Some(lon), _) => (lat, lon),
            (_, _, Some(center)) => (center.lat, center.lon),
            _ => continue,
        };
        places.push(Place {
            name,
            category: categorize(&tags),
            lat,
            lon,
        });
    }

    places.sort_by_key(|p| category_rank(&p.category));
    places
}

/// Collapse raw OSM tags into the display categories the sort understands.
/// Any `historic=*` value counts as historic; unrecognized tourism values
/// pass through as-is.
fn categorize(tags: &OverpassTags) -> String {
    if tags.historic.is_some() {
        return "historic".to_string();
    }
    match tags.tourism.as_deref() {
        Some("museum") => "museum".to_string(),
        _ if tags.amenity.as_deref() == Some("place_of_worship") => {
            "religious site".to_string()
        }
        Some("viewpoint") => "viewpoint".to_string(),
        Some("artwork") => "artwork".to_string(),
        Some(other) => other.to_string(),
        None => "attraction".to_string(),
    }
}

fn category_rank(category: &str) -> usize {
    PRIORITY_CATEGORIES
        .iter()
        .position(|c| *c == category)
        .unwrap_or(PRIORITY_CATEGORIES.len())
}

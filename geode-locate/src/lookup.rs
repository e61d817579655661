//! Geocoding and mineral occurrence lookups.

use std::time::Duration;

use geode_core::{Category, ProbabilityOffsets};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::fallback_location;
use crate::{CrustType, LocationResolution, ResolvedLocation};

/// Offset added for every occurrence of a category near the location.
const OCCURRENCE_BOOST: f64 = 0.02;
/// Largest total offset a single category can receive from occurrences.
const MAX_OCCURRENCE_BOOST: f64 = 0.25;
/// Degrees of longitude/latitude per world unit is `1 / COORDINATE_SCALE`.
const COORDINATE_SCALE: f64 = 10_000.0;
/// Upper bound on occurrences fetched per lookup.
const MAX_FEATURES: &str = "200";

/// An error that can occur while looking up a location.
#[derive(Error, Debug)]
pub enum LocateError {
    /// Lookups are turned off in the configuration.
    #[error("Location lookups are disabled")]
    Disabled,
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    /// A configured endpoint is not a valid URL.
    #[error("Invalid lookup URL {0}")]
    InvalidUrl(String),
    /// The service could not be reached.
    #[error("Lookup service unreachable")]
    FailedResponse,
    /// The service answered with an unexpected status.
    #[error("Unknown Status Code {0}")]
    UnknownStatusCode(StatusCode),
    /// The response body was not in the expected shape.
    #[error("Failed to parse lookup response: {0}")]
    FailedParse(String),
    /// The geocoder found nothing for the location.
    #[error("No geocoding match for {0:?}")]
    NoMatch(String),
}

fn default_enabled() -> bool {
    true
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_owned()
}

fn default_occurrence_url() -> String {
    "https://mrdata.usgs.gov/services/wfs/mrds".to_owned()
}

const fn default_search_radius_deg() -> f64 {
    0.5
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    5_000
}

fn default_user_agent() -> String {
    concat!("geode/", env!("CARGO_PKG_VERSION")).to_owned()
}

/// Settings for the lookup services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateConfig {
    /// When false every location resolves through the fallback.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Nominatim-compatible search endpoint.
    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,
    /// WFS endpoint returning mineral occurrences as GeoJSON.
    #[serde(default = "default_occurrence_url")]
    pub occurrence_url: String,
    /// Half-width of the occurrence search box, in degrees.
    #[serde(default = "default_search_radius_deg")]
    pub search_radius_deg: f64,
    /// Attempts per HTTP request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// User agent sent to the services.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            geocoder_url: default_geocoder_url(),
            occurrence_url: default_occurrence_url(),
            search_radius_deg: default_search_radius_deg(),
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct OccurrenceCollection {
    #[serde(default)]
    features: Vec<OccurrenceFeature>,
}

#[derive(Deserialize)]
struct OccurrenceFeature {
    #[serde(default)]
    properties: OccurrenceProperties,
}

#[derive(Deserialize, Default)]
struct OccurrenceProperties {
    #[serde(default)]
    commod1: Option<String>,
}

/// Map a commodity name from an occurrence record to a category.
#[must_use]
pub fn commodity_category(commodity: &str) -> Option<Category> {
    match commodity.trim().to_ascii_lowercase().as_str() {
        "gold" => Some(Category::Gold),
        "copper" => Some(Category::Copper),
        "iron" | "iron ore" | "magnetite" | "hematite" => Some(Category::Iron),
        "diamond" | "gemstone, diamond" => Some(Category::Diamond),
        "emerald" | "beryl" | "beryllium" => Some(Category::Emerald),
        "mica" | "muscovite" | "biotite" => Some(Category::Mica),
        "feldspar" => Some(Category::Feldspar),
        "quartz" | "silica" => Some(Category::Quartz),
        "granite" | "stone, dimension" => Some(Category::Granite),
        "basalt" => Some(Category::Basalt),
        _ => None,
    }
}

/// Sum occurrence boosts per category, capped per category.
#[must_use]
pub fn occurrence_offsets<I: IntoIterator<Item = Category>>(occurrences: I) -> ProbabilityOffsets {
    let mut offsets = ProbabilityOffsets::new();
    for category in occurrences {
        if offsets.get(category) < MAX_OCCURRENCE_BOOST {
            offsets.add(category, OCCURRENCE_BOOST);
        }
    }
    for category in Category::ALL {
        if offsets.get(category) > MAX_OCCURRENCE_BOOST {
            offsets.insert(category, MAX_OCCURRENCE_BOOST);
        }
    }
    offsets
}

/// Oceanic when mafic occurrences outnumber felsic ones.
#[must_use]
pub fn crust_from_occurrences(occurrences: &[Category]) -> CrustType {
    let mafic = occurrences
        .iter()
        .filter(|c| matches!(c, Category::Basalt | Category::Iron | Category::Copper))
        .count();
    let felsic = occurrences
        .iter()
        .filter(|c| {
            matches!(
                c,
                Category::Granite | Category::Quartz | Category::Feldspar | Category::Mica
            )
        })
        .count();
    if mafic > felsic {
        CrustType::Oceanic
    } else {
        CrustType::Continental
    }
}

/// Map geographic coordinates to a world `(x, y)` offset.
#[must_use]
pub fn offsets_from_coordinates(lat: f64, lon: f64) -> (i64, i64) {
    (
        ((lon + 180.0) * COORDINATE_SCALE).round() as i64,
        ((lat + 90.0) * COORDINATE_SCALE).round() as i64,
    )
}

/// Resolves locations through the configured lookup services.
pub struct LocationResolver {
    client: reqwest::Client,
    config: LocateConfig,
}

impl LocationResolver {
    /// Create a resolver with its own HTTP client.
    pub fn new(config: LocateConfig) -> Result<Self, LocateError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LocateError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Resolve a location, falling back to hashed values on any lookup failure.
    pub async fn resolve(&self, location: &str) -> LocationResolution {
        match self.lookup(location).await {
            Ok(resolved) => LocationResolution::ResolvedViaLookup(resolved),
            Err(err) => {
                log::warn!("Location lookup for {location:?} failed, using fallback: {err}");
                LocationResolution::ResolvedViaFallback(fallback_location(location))
            }
        }
    }

    /// Geocode the location and gather nearby occurrences.
    pub async fn lookup(&self, location: &str) -> Result<ResolvedLocation, LocateError> {
        if !self.config.enabled {
            return Err(LocateError::Disabled);
        }

        let geocode_url = Url::parse_with_params(
            &self.config.geocoder_url,
            &[("q", location), ("format", "json"), ("limit", "1")],
        )
        .map_err(|_| LocateError::InvalidUrl(self.config.geocoder_url.clone()))?;
        let hits: Vec<GeocodeHit> = self.get_json(geocode_url).await?;
        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| LocateError::NoMatch(location.to_owned()))?;
        let lat: f64 = hit
            .lat
            .parse()
            .map_err(|_| LocateError::FailedParse(format!("latitude {:?}", hit.lat)))?;
        let lon: f64 = hit
            .lon
            .parse()
            .map_err(|_| LocateError::FailedParse(format!("longitude {:?}", hit.lon)))?;
        log::debug!(
            "Geocoded {location:?} to ({lat}, {lon}) {}",
            hit.display_name.as_deref().unwrap_or_default()
        );

        let r = self.config.search_radius_deg;
        let bbox = format!("{},{},{},{}", lon - r, lat - r, lon + r, lat + r);
        let occurrence_url = Url::parse_with_params(
            &self.config.occurrence_url,
            &[
                ("service", "WFS"),
                ("version", "1.1.0"),
                ("request", "GetFeature"),
                ("typeName", "mrds"),
                ("outputFormat", "json"),
                ("maxFeatures", MAX_FEATURES),
                ("bbox", bbox.as_str()),
            ],
        )
        .map_err(|_| LocateError::InvalidUrl(self.config.occurrence_url.clone()))?;
        let collection: OccurrenceCollection = self.get_json(occurrence_url).await?;

        let occurrences: Vec<Category> = collection
            .features
            .iter()
            .filter_map(|feature| feature.properties.commod1.as_deref())
            .flat_map(|commodities| commodities.split(','))
            .filter_map(commodity_category)
            .collect();
        log::debug!(
            "Found {} categorised occurrences near {location:?}",
            occurrences.len()
        );

        let (x_offset, y_offset) = offsets_from_coordinates(lat, lon);
        Ok(ResolvedLocation {
            x_offset,
            y_offset,
            z_offset: 0,
            crust_type: crust_from_occurrences(&occurrences),
            offsets: occurrence_offsets(occurrences),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, LocateError> {
        let mut last_error = LocateError::FailedResponse;

        for _ in 0..self.config.max_retries.max(1) {
            let Ok(response) = self.client.get(url.clone()).send().await else {
                last_error = LocateError::FailedResponse;
                continue;
            };

            match response.status() {
                StatusCode::OK => {
                    return response
                        .json()
                        .await
                        .map_err(|e| LocateError::FailedParse(e.to_string()));
                }
                other => last_error = LocateError::UnknownStatusCode(other),
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_commodity_names() {
        assert_eq!(commodity_category("Gold"), Some(Category::Gold));
        assert_eq!(commodity_category(" Copper"), Some(Category::Copper));
        assert_eq!(commodity_category("Iron Ore"), Some(Category::Iron));
        assert_eq!(commodity_category("Beryl"), Some(Category::Emerald));
        assert_eq!(commodity_category("Sand and Gravel, Construction"), None);
    }

    #[test]
    fn test_occurrence_offsets_are_capped() {
        let offsets = occurrence_offsets(
            std::iter::repeat_n(Category::Gold, 40).chain([Category::Mica, Category::Mica]),
        );
        assert!((offsets.get(Category::Gold) - MAX_OCCURRENCE_BOOST).abs() < 1e-12);
        assert!((offsets.get(Category::Mica) - 0.04).abs() < 1e-12);
        assert_eq!(offsets.get(Category::Void), 0.0);
    }

    #[test]
    fn test_crust_classification() {
        use Category::{Basalt, Copper, Feldspar, Gold, Granite, Iron};
        assert_eq!(crust_from_occurrences(&[]), CrustType::Continental);
        assert_eq!(
            crust_from_occurrences(&[Iron, Copper, Granite, Gold]),
            CrustType::Oceanic
        );
        assert_eq!(
            crust_from_occurrences(&[Basalt, Granite, Feldspar]),
            CrustType::Continental
        );
    }

    #[test]
    fn test_coordinates_map_to_positive_offsets() {
        assert_eq!(offsets_from_coordinates(0.0, 0.0), (1_800_000, 900_000));
        assert_eq!(offsets_from_coordinates(-90.0, -180.0), (0, 0));
        assert_eq!(
            offsets_from_coordinates(48.856_6, 2.352_2),
            (1_823_522, 1_388_566)
        );
    }

    #[test]
    fn test_parse_service_responses() {
        let hits: Vec<GeocodeHit> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "48.8566", "lon": "2.3522", "display_name": "Paris"}]"#,
        )
        .unwrap();
        assert_eq!(hits[0].lat, "48.8566");

        let collection: OccurrenceCollection = serde_json::from_str(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"commod1": "Gold, Silver"}},
                {"type": "Feature", "properties": {"site_name": "Unknown"}},
                {"type": "Feature"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(collection.features.len(), 3);
        assert_eq!(
            collection.features[0].properties.commod1.as_deref(),
            Some("Gold, Silver")
        );
    }

    #[tokio::test]
    async fn test_disabled_resolver_uses_fallback() {
        let config = LocateConfig {
            enabled: false,
            ..LocateConfig::default()
        };
        let resolver = LocationResolver::new(config).unwrap();
        let resolution = resolver.resolve("Paris").await;
        assert!(resolution.is_fallback());
        assert_eq!(resolution.location(), &fallback_location("Paris"));
    }

    #[tokio::test]
    async fn test_invalid_url_uses_fallback() {
        let config = LocateConfig {
            geocoder_url: "not a url".to_owned(),
            ..LocateConfig::default()
        };
        let resolver = LocationResolver::new(config).unwrap();
        assert!(matches!(
            resolver.lookup("Paris").await,
            Err(LocateError::InvalidUrl(_))
        ));
        assert!(resolver.resolve("Paris").await.is_fallback());
    }

    #[test]
    fn test_resolution_wire_format() {
        let resolution = LocationResolution::ResolvedViaFallback(fallback_location("Cornwall"));
        let value = serde_json::to_value(&resolution).unwrap();
        assert_eq!(value["source"], "fallback");
        assert_eq!(value["x_offset"], 68_968_935);
        assert_eq!(value["crust_type"], "continental");
        assert_eq!(value["prob_offsets"]["granite"], 0.05);
    }

    const GEOCODE_PARIS: &str =
        r#"[{"lat": "48.8566", "lon": "2.3522", "display_name": "Paris, France"}]"#;
    const OCCURRENCES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"commod1": "Gold, Copper"}},
        {"type": "Feature", "properties": {"commod1": "Gold"}},
        {"type": "Feature", "properties": {"commod1": "Iron"}},
        {"type": "Feature", "properties": {"commod1": "Sand and Gravel"}}
    ]}"#;

    /// Answer one connection per canned `(status, body)` pair, in order.
    async fn canned_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                }

                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (base, hits)
    }

    fn local_resolver(base: &str, max_retries: u32) -> LocationResolver {
        let config = LocateConfig {
            geocoder_url: format!("{base}/search"),
            occurrence_url: format!("{base}/wfs"),
            max_retries,
            ..LocateConfig::default()
        };
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap();
        LocationResolver { client, config }
    }

    #[tokio::test]
    async fn test_lookup_retries_then_resolves() {
        let (base, hits) = canned_server(vec![
            (503, ""),
            (200, GEOCODE_PARIS),
            (200, OCCURRENCES),
        ])
        .await;
        let resolver = local_resolver(&base, 3);

        let resolution = resolver.resolve("Paris").await;
        assert!(!resolution.is_fallback());
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let location = resolution.location();
        assert_eq!(
            (location.x_offset, location.y_offset, location.z_offset),
            (1_823_522, 1_388_566, 0)
        );
        assert_eq!(location.crust_type, CrustType::Oceanic);
        assert!((location.offsets.get(Category::Gold) - 0.04).abs() < 1e-12);
        assert!((location.offsets.get(Category::Copper) - 0.02).abs() < 1e-12);
        assert!((location.offsets.get(Category::Iron) - 0.02).abs() < 1e-12);
        assert_eq!(location.offsets.iter().count(), 3);
    }

    #[tokio::test]
    async fn test_unexpected_status_exhausts_retries() {
        let (base, hits) = canned_server(vec![(404, ""), (404, "")]).await;
        let resolver = local_resolver(&base, 2);

        let result = resolver.lookup("Atlantis").await;
        assert!(matches!(
            result,
            Err(LocateError::UnknownStatusCode(code)) if code == StatusCode::NOT_FOUND
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_geocode_is_no_match() {
        let (base, _) = canned_server(vec![(200, "[]")]).await;
        let resolver = local_resolver(&base, 1);
        assert!(matches!(
            resolver.lookup("Nowhere").await,
            Err(LocateError::NoMatch(name)) if name == "Nowhere"
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let (base, _) = canned_server(vec![(200, "{not json")]).await;
        let resolver = local_resolver(&base, 1);
        assert!(matches!(
            resolver.lookup("Paris").await,
            Err(LocateError::FailedParse(_))
        ));
    }
}

use std::collections::HashMap;
use std::time::Duration;

use postbot_config::{Directory, Geocoder};
use postbot_contracts::{DirectoryPayload, DirectoryRecord, ReverseGeocodePayload};
use postbot_kernel::{is_fresh, is_valid_pincode, normalize_postcode};
use reqwest::header::ACCEPT;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Why an upstream lookup produced nothing usable. Callers turn this into a
/// conversational apology; it never reaches the transport.
#[derive(Debug, Error)]
pub enum Unavailable {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream answered with http {0}")]
    HttpStatus(u16),
    #[error("response did not decode: {0}")]
    Decode(String),
    #[error("response contained no records")]
    Empty,
    #[error("response carried no postcode")]
    MissingPostcode,
    #[error("postcode {0:?} is not a 6-digit pincode")]
    ForeignPostcode(String),
}

pub struct PincodeCache {
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

#[derive(Clone)]
struct CacheEntry {
    record: DirectoryRecord,
    captured_at: Instant,
}

impl PincodeCache {
    pub fn new(enabled: bool, ttl_ms: u64, max_entries: usize) -> Self {
        Self {
            enabled,
            ttl: Duration::from_millis(ttl_ms),
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A stale entry counts as absent and is dropped.
    pub async fn get(&self, pincode: &str) -> Option<DirectoryRecord> {
        if !self.enabled {
            return None;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(pincode) {
            Some(entry) if is_fresh(now.saturating_duration_since(entry.captured_at), self.ttl) => {
                Some(entry.record.clone())
            }
            Some(_) => {
                entries.remove(pincode);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, pincode: &str, record: DirectoryRecord) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.max_entries && !entries.contains_key(pincode) {
            entries.clear();
        }
        entries.insert(
            pincode.to_string(),
            CacheEntry {
                record,
                captured_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

pub struct UpstreamGateway {
    directory_url: String,
    geocoder_url: String,
    directory_client: Client,
    geocoder_client: Client,
    cache: PincodeCache,
}

impl UpstreamGateway {
    pub fn new(directory: &Directory, geocoder: &Geocoder) -> Result<Self, String> {
        let directory_client = Client::builder()
            .timeout(Duration::from_millis(directory.timeout_ms))
            .user_agent(directory.user_agent.as_str())
            .build()
            .map_err(|e| e.to_string())?;
        let geocoder_client = Client::builder()
            .timeout(Duration::from_millis(geocoder.timeout_ms))
            .user_agent(geocoder.user_agent.as_str())
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            directory_url: directory.base_url.trim_end_matches('/').to_string(),
            geocoder_url: geocoder.base_url.trim_end_matches('/').to_string(),
            directory_client,
            geocoder_client,
            cache: PincodeCache::new(
                directory.cache.enabled,
                directory.cache.ttl_ms,
                directory.cache.max_entries,
            ),
        })
    }

    pub fn cache(&self) -> &PincodeCache {
        &self.cache
    }

    pub async fn resolve_pincode(&self, pincode: &str) -> Result<DirectoryRecord, Unavailable> {
        if let Some(hit) = self.cache.get(pincode).await {
            tracing::debug!(pincode, "pincode cache hit");
            return Ok(hit);
        }

        match self.fetch_pincode(pincode).await {
            Ok(record) => {
                self.cache.insert(pincode, record.clone()).await;
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(pincode, error = %err, "pincode directory unavailable");
                Err(err)
            }
        }
    }

    async fn fetch_pincode(&self, pincode: &str) -> Result<DirectoryRecord, Unavailable> {
        let url = format!("{}/pincode/{pincode}", self.directory_url);
        let response = self
            .directory_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Unavailable::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Unavailable::HttpStatus(response.status().as_u16()));
        }
        let payload: Vec<DirectoryPayload> = response
            .json()
            .await
            .map_err(|e| Unavailable::Decode(e.to_string()))?;
        let first = payload.into_iter().next().ok_or(Unavailable::Empty)?;
        Ok(DirectoryRecord::from(first))
    }

    pub async fn resolve_coordinates(&self, lat: f64, lon: f64) -> Result<String, Unavailable> {
        let result = self.fetch_postcode(lat, lon).await;
        if let Err(err) = &result {
            tracing::warn!(lat, lon, error = %err, "reverse geocoding unavailable");
        }
        result
    }

    async fn fetch_postcode(&self, lat: f64, lon: f64) -> Result<String, Unavailable> {
        let url = format!("{}/reverse", self.geocoder_url);
        let response = self
            .geocoder_client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Unavailable::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Unavailable::HttpStatus(response.status().as_u16()));
        }
        let payload: ReverseGeocodePayload = response
            .json()
            .await
            .map_err(|e| Unavailable::Decode(e.to_string()))?;
        let postcode = payload
            .postcode()
            .map(normalize_postcode)
            .ok_or(Unavailable::MissingPostcode)?;
        if !is_valid_pincode(&postcode) {
            return Err(Unavailable::ForeignPostcode(postcode));
        }
        Ok(postcode)
    }
}

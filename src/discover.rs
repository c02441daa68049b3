//! Nearby restaurant suggestions from the discovery backend, and the step that
//! turns one of them into a journal entry.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    data::{PriceRange, Rating, Restaurant},
    filter::{contains_lowered, distinct_non_empty},
    journal::Collection,
};

/// Name of the upstream place directory, quoted in imported notes.
pub const SOURCE_NAME: &str = "Foursquare";

pub const DEFAULT_PRICE_TIER: u8 = 2;

pub const UNKNOWN_CUISINE: &str = "Restaurant";
pub const UNKNOWN_ADDRESS: &str = "Address not available";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub key: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub radius: u32,
}

pub const DEFAULT_AREA: &str = "all";

pub const AREAS: &[Area] = &[
    Area { key: "all", name: "All Bay Area", lat: 37.7749, lon: -122.4194, radius: 25000 },
    Area { key: "mission", name: "Mission District", lat: 37.7599, lon: -122.4148, radius: 3000 },
    Area { key: "soma", name: "SoMa", lat: 37.7749, lon: -122.4194, radius: 3000 },
    Area { key: "hayes", name: "Hayes Valley", lat: 37.7749, lon: -122.4256, radius: 2000 },
    Area { key: "japantown", name: "Japantown", lat: 37.7853, lon: -122.4306, radius: 2000 },
    Area { key: "oakland", name: "Oakland", lat: 37.8044, lon: -122.2712, radius: 5000 },
    Area { key: "berkeley", name: "Berkeley", lat: 37.8715, lon: -122.2730, radius: 5000 },
    Area { key: "paloalto", name: "Palo Alto", lat: 37.4419, lon: -122.1430, radius: 5000 },
    Area { key: "sanmateo", name: "San Mateo", lat: 37.5630, lon: -122.3255, radius: 5000 },
    Area { key: "cupertino", name: "Cupertino", lat: 37.3230, lon: -122.0322, radius: 5000 },
    Area { key: "sunnyvale", name: "Sunnyvale", lat: 37.3688, lon: -122.0363, radius: 5000 },
    Area { key: "santaclara", name: "Santa Clara", lat: 37.3541, lon: -121.9552, radius: 5000 },
];

pub fn area(key: &str) -> Option<&'static Area> {
    AREAS.iter().find(|area| area.key == key)
}

pub fn default_area() -> &'static Area {
    &AREAS[0]
}

/// Query string of a discover request. Absent values are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<u32>,
}

impl From<&Area> for DiscoverParams {
    fn from(area: &Area) -> Self {
        Self {
            lat: Some(area.lat),
            lon: Some(area.lon),
            radius: Some(area.radius),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub price: Option<u8>,
    // miles
    #[serde(default)]
    pub distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
}

impl Suggestion {
    pub fn price_range(&self) -> PriceRange {
        let tier = self
            .price
            .filter(|tier| *tier > 0)
            .unwrap_or(DEFAULT_PRICE_TIER);
        PriceRange::from_tier(tier)
    }
}

/// Body of `GET /api/discover`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBatch {
    #[serde(default)]
    pub restaurants: Vec<Suggestion>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub count: usize,
}

impl SuggestionBatch {
    pub fn new(restaurants: Vec<Suggestion>, cached: bool) -> Self {
        let count = restaurants.len();
        Self {
            restaurants,
            cached,
            count,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to fetch restaurants: the discovery service answered {0}")]
    Status(reqwest::StatusCode),
    #[error("Failed to fetch restaurants: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Failed to read restaurants from the discovery service: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DiscoveryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_suggestions(
        &self,
        params: &DiscoverParams,
    ) -> Result<SuggestionBatch, FetchError> {
        let url = format!("{}/api/discover", self.base_url);
        tracing::debug!(?params, "fetching suggestions from {url}");

        let resp = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(FetchError::Network)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        resp.json::<SuggestionBatch>()
            .await
            .map_err(FetchError::Decode)
    }

    /// Ask the backend to forget cached results, then fetch again. A failed
    /// clear is only logged.
    pub async fn clear_cache(&self, params: &DiscoverParams) -> Result<SuggestionBatch, FetchError> {
        let url = format!("{}/api/clear-cache", self.base_url);
        let cleared = self
            .http
            .post(&url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        if let Err(e) = cleared {
            tracing::warn!("fail to clear discovery cache: {e}");
        }

        self.fetch_suggestions(params).await
    }
}

pub fn is_already_favorite(suggestion: &Suggestion, collection: &Collection) -> bool {
    collection.contains_foursquare_id(&suggestion.id)
}

pub fn to_favorite(suggestion: &Suggestion) -> Restaurant {
    let neighborhood = suggestion.neighborhood.as_deref().unwrap_or_default();
    Restaurant {
        id: Uuid::new_v4(),
        name: suggestion.name.clone(),
        cuisine_type: or_placeholder(&suggestion.cuisine, UNKNOWN_CUISINE),
        location: or_placeholder(&suggestion.address, UNKNOWN_ADDRESS),
        rating: Rating::from_score(suggestion.rating),
        price_range: suggestion.price_range(),
        notes: format!("Discovered via {SOURCE_NAME} • {neighborhood}"),
        visit_dates: Vec::new(),
        dishes: Vec::new(),
        foursquare_id: Some(suggestion.id.clone()),
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let value = value.trim();
    let value = if value.is_empty() { placeholder } else { value };
    value.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Rating,
    Distance,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rating" => Ok(Self::Rating),
            "distance" => Ok(Self::Distance),
            other => Err(format!("unknown sort order {other:?}, use rating or distance")),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rating => f.write_str("rating"),
            Self::Distance => f.write_str("distance"),
        }
    }
}

/// Filter by cuisine substring, then sort. Ties keep their fetched order.
pub fn arrange<'a>(suggestions: &'a [Suggestion], cuisine: &str, sort: SortBy) -> Vec<&'a Suggestion> {
    let cuisine = cuisine.to_lowercase();
    let mut shown: Vec<&Suggestion> = suggestions
        .iter()
        .filter(|s| cuisine.is_empty() || contains_lowered(&s.cuisine, &cuisine))
        .collect();

    match sort {
        SortBy::Rating => shown.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        SortBy::Distance => shown.sort_by(|a, b| a.distance.total_cmp(&b.distance)),
    }
    shown
}

pub fn suggestion_cuisines(suggestions: &[Suggestion]) -> Vec<String> {
    distinct_non_empty(suggestions.iter().map(|s| s.cuisine.as_str()))
}

/// Handed out when a request starts, handed back with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

/// State of the discover screen.
///
/// Every request gets a ticket from a monotonically increasing generation.
/// Only the outcome of the latest ticket is applied, so a slow answer for a
/// neighborhood the user already left can not overwrite the current list.
#[derive(Debug, Clone)]
pub struct DiscoverView {
    area: &'static Area,
    sort: SortBy,
    cuisine: String,
    suggestions: Vec<Suggestion>,
    cached: bool,
    loading: bool,
    error: Option<String>,
    generation: u64,
}

impl Default for DiscoverView {
    fn default() -> Self {
        Self::new(default_area())
    }
}

impl DiscoverView {
    pub fn new(area: &'static Area) -> Self {
        Self {
            area,
            sort: SortBy::default(),
            cuisine: String::new(),
            suggestions: Vec::new(),
            cached: false,
            loading: false,
            error: None,
            generation: 0,
        }
    }

    pub fn area(&self) -> &'static Area {
        self.area
    }

    pub fn params(&self) -> DiscoverParams {
        DiscoverParams::from(self.area)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn suggestion(&self, id: &str) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| s.id == id)
    }

    pub fn set_sort(&mut self, sort: SortBy) {
        self.sort = sort;
    }

    pub fn set_cuisine_filter(&mut self, cuisine: impl Into<String>) {
        self.cuisine = cuisine.into();
    }

    /// Start a fetch for the current area, unless one is already running.
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        if self.loading {
            return None;
        }
        Some(self.begin())
    }

    /// Switch neighborhood. The new area always gets a fresh request, which
    /// supersedes one still in flight.
    pub fn select_area(&mut self, key: &str) -> Option<FetchTicket> {
        let area = area(key)?;
        if area.key == self.area.key {
            return None;
        }
        self.area = area;
        Some(self.begin())
    }

    /// Apply the outcome of a request. Returns false when the ticket is stale.
    pub fn finish(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<SuggestionBatch, FetchError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::warn!(
                "dropping stale discover response {} (latest is {})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        self.loading = false;
        match outcome {
            Ok(batch) => {
                self.suggestions = batch.restaurants;
                self.cached = batch.cached;
                self.error = None;
            }
            Err(e) => {
                tracing::error!("fail to fetch suggestions: {e}");
                self.error = Some(e.to_string());
            }
        }
        true
    }

    pub fn displayed(&self) -> Vec<&Suggestion> {
        arrange(&self.suggestions, &self.cuisine, self.sort)
    }

    pub fn cuisines(&self) -> Vec<String> {
        suggestion_cuisines(&self.suggestions)
    }

    fn begin(&mut self) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        FetchTicket {
            generation: self.generation,
        }
    }
}

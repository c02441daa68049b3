use anyhow::Context;
use foodie_journal::discover::{
    DiscoverParams, Suggestion, DEFAULT_PRICE_TIER, UNKNOWN_ADDRESS, UNKNOWN_CUISINE,
};
use serde::Deserialize;

pub(super) const VENUES_SEARCH_URL: &str = "https://api.foursquare.com/v2/venues/search";
const API_VERSION: &str = "20231010";
const RESULT_LIMIT: u32 = 50;
const METRES_PER_MILE: f64 = 1609.34;

// Japanese, Sushi, Ramen, Café, Bubble Tea Shop
const CATEGORY_IDS: &str = "4bf58dd8d48988d111941735,4bf58dd8d48988d1d2941735,55a59bace4b013909087cb24,4bf58dd8d48988d16d941735,52e81612bcbc57f1066b7a0c";

// first hit wins
const CUISINE_KEYWORDS: &[(&str, &str)] = &[
    ("sushi", "Sushi"),
    ("japanese", "Japanese"),
    ("ramen", "Ramen"),
    ("tea", "Tea House"),
    ("café", "Café"),
    ("coffee", "Café"),
    ("bubble tea", "Bubble Tea"),
    ("asian", "Asian Fusion"),
];

pub(super) struct Credentials {
    pub(super) client_id: String,
    pub(super) client_secret: String,
}

pub(super) struct Foursquare {
    http: reqwest::Client,
    search_url: String,
    credentials: Option<Credentials>,
}

impl Foursquare {
    pub(super) fn new(search_url: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            http: reqwest::Client::new(),
            search_url: search_url.into(),
            credentials,
        }
    }

    pub(super) fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    pub(super) async fn search(
        &self,
        lat: f64,
        lon: f64,
        radius: u32,
    ) -> anyhow::Result<Vec<Suggestion>> {
        let Some(credentials) = &self.credentials else {
            anyhow::bail!("Foursquare API credentials not configured");
        };

        let query = [
            ("ll", format!("{lat},{lon}")),
            ("radius", radius.to_string()),
            ("categoryId", CATEGORY_IDS.to_string()),
            ("limit", RESULT_LIMIT.to_string()),
            ("client_id", credentials.client_id.clone()),
            ("client_secret", credentials.client_secret.clone()),
            ("v", API_VERSION.to_string()),
        ];

        let resp: SearchResponse = self
            .http
            .get(&self.search_url)
            .query(&query)
            .send()
            .await
            .context("fail to reach Foursquare")?
            .error_for_status()
            .context("Foursquare rejected the venue search")?
            .json()
            .await
            .context("fail to decode Foursquare venues")?;

        Ok(resp
            .response
            .venues
            .into_iter()
            .map(Venue::into_suggestion)
            .collect())
    }
}

/// Resolve the request's area, the whole Bay Area when a field is missing.
pub(super) fn search_area(params: &DiscoverParams) -> (f64, f64, u32) {
    let fallback = foodie_journal::discover::default_area();
    (
        params.lat.unwrap_or(fallback.lat),
        params.lon.unwrap_or(fallback.lon),
        params.radius.unwrap_or(fallback.radius),
    )
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: SearchBody,
}

#[derive(Deserialize, Default)]
struct SearchBody {
    #[serde(default)]
    venues: Vec<Venue>,
}

#[derive(Deserialize)]
pub(super) struct Venue {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: VenueLocation,
    #[serde(default)]
    categories: Vec<Category>,
    // out of 10
    rating: Option<f64>,
    price: Option<VenuePrice>,
}

#[derive(Deserialize, Default)]
struct VenueLocation {
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    neighborhood: Option<String>,
    distance: Option<f64>,
}

#[derive(Deserialize)]
struct Category {
    name: Option<String>,
}

#[derive(Deserialize)]
struct VenuePrice {
    tier: Option<u8>,
}

impl Venue {
    pub(super) fn into_suggestion(self) -> Suggestion {
        let distance = self.location.distance.unwrap_or(0.0) / METRES_PER_MILE;
        Suggestion {
            address: format_address(&self.location),
            cuisine: cuisine_type(&self.categories),
            neighborhood: Some(self.location.neighborhood.unwrap_or_default()),
            id: self.id,
            name: self.name,
            rating: self.rating.map(|r| r / 2.0).unwrap_or(0.0),
            distance: (distance * 10.0).round() / 10.0,
            price: Some(
                self.price
                    .and_then(|p| p.tier)
                    .unwrap_or(DEFAULT_PRICE_TIER),
            ),
            photo: None,
            hours: Some("Hours not available".to_string()),
        }
    }
}

fn format_address(location: &VenueLocation) -> String {
    let parts: Vec<&str> = [&location.address, &location.city, &location.state]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        UNKNOWN_ADDRESS.to_string()
    } else {
        parts.join(", ")
    }
}

fn cuisine_type(categories: &[Category]) -> String {
    let Some(primary) = categories.first() else {
        return UNKNOWN_CUISINE.to_string();
    };
    let primary = primary.name.as_deref().unwrap_or(UNKNOWN_CUISINE);
    let lowered = primary.to_lowercase();

    CUISINE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(*keyword))
        .map(|(_, cuisine)| cuisine.to_string())
        .unwrap_or_else(|| primary.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue(json: serde_json::Value) -> Venue {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn maps_a_full_venue() {
        let s = venue(serde_json::json!({
            "id": "4b5a",
            "name": "Marufuku Ramen",
            "location": {
                "address": "1581 Webster St",
                "city": "San Francisco",
                "state": "CA",
                "neighborhood": "Japantown",
                "distance": 3218.68
            },
            "categories": [{"name": "Ramen Restaurant"}],
            "rating": 8.8,
            "price": {"tier": 1}
        }))
        .into_suggestion();

        assert_eq!(s.address, "1581 Webster St, San Francisco, CA");
        assert_eq!(s.cuisine, "Ramen");
        assert_eq!(s.neighborhood.as_deref(), Some("Japantown"));
        assert!((s.rating - 4.4).abs() < 1e-9);
        assert_eq!(s.distance, 2.0);
        assert_eq!(s.price, Some(1));
    }

    #[test]
    fn sparse_venue_gets_defaults() {
        let s = venue(serde_json::json!({"id": "x", "name": "Pop-up"})).into_suggestion();
        assert_eq!(s.address, "Address not available");
        assert_eq!(s.cuisine, "Restaurant");
        assert_eq!(s.rating, 0.0);
        assert_eq!(s.distance, 0.0);
        assert_eq!(s.price, Some(2));
    }

    #[test]
    fn nameless_venue_does_not_sink_the_batch() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "response": {"venues": [
                {"id": "a", "name": "Marufuku Ramen"},
                {"id": "b", "location": {"city": "Oakland"}}
            ]}
        }))
        .unwrap();
        let names: Vec<String> = body
            .response
            .venues
            .into_iter()
            .map(|v| v.into_suggestion().name)
            .collect();
        assert_eq!(names, vec!["Marufuku Ramen", ""]);
    }

    #[test]
    fn cuisine_keywords() {
        let cuisine = |name: &str| {
            cuisine_type(&[Category {
                name: Some(name.to_string()),
            }])
        };
        assert_eq!(cuisine("Sushi Restaurant"), "Sushi");
        assert_eq!(cuisine("Coffee Shop"), "Café");
        assert_eq!(cuisine("Asian Restaurant"), "Asian Fusion");
        assert_eq!(cuisine("Bakery"), "Bakery");
    }

    #[test]
    fn partial_address() {
        let location = VenueLocation {
            city: Some("Oakland".into()),
            state: Some("CA".into()),
            ..Default::default()
        };
        assert_eq!(format_address(&location), "Oakland, CA");
    }

    #[test]
    fn missing_params_fall_back_to_the_bay_area() {
        let (lat, lon, radius) = search_area(&DiscoverParams {
            radius: Some(2000),
            ..Default::default()
        });
        assert_eq!((lat, lon, radius), (37.7749, -122.4194, 2000));
    }
}

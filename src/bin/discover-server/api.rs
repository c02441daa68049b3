use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use actix_web::{web, HttpResponse};
use foodie_journal::discover::{DiscoverParams, Suggestion, SuggestionBatch};

use crate::foursquare::{self, Foursquare};

struct CacheEntry {
    restaurants: Vec<Suggestion>,
    stored_at: Instant,
}

pub(super) struct ApiState {
    foursquare: Foursquare,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ApiState {
    pub(super) fn new(foursquare: Foursquare, ttl: Duration) -> Self {
        Self {
            foursquare,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // a panicked holder can not leave the map half-written
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cached(&self, key: &str) -> Option<Vec<Suggestion>> {
        let mut cache = self.cache();
        let entry = cache.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(entry.restaurants.clone());
        }
        cache.remove(key);
        None
    }

    fn store(&self, key: String, restaurants: Vec<Suggestion>) {
        let ttl = self.ttl;
        let mut cache = self.cache();
        // keys come from the query string, so stale searches must not pile up
        cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        cache.insert(
            key,
            CacheEntry {
                restaurants,
                stored_at: Instant::now(),
            },
        );
    }

    fn clear(&self) -> usize {
        let mut cache = self.cache();
        let dropped = cache.len();
        cache.clear();
        dropped
    }
}

fn cache_key(lat: f64, lon: f64, radius: u32) -> String {
    format!("{lat:.4},{lon:.4},{radius}")
}

#[derive(serde::Serialize)]
struct ErrJsonResp {
    error: String,
    message: String,
}

#[derive(serde::Serialize)]
struct MessageResp {
    message: &'static str,
}

#[actix_web::get("/api/discover")]
pub(super) async fn discover(
    data: web::Data<ApiState>,
    query: web::Query<DiscoverParams>,
) -> HttpResponse {
    let (lat, lon, radius) = foursquare::search_area(&query);
    let key = cache_key(lat, lon, radius);

    if let Some(restaurants) = data.cached(&key) {
        tracing::debug!("serving {key} from cache");
        return HttpResponse::Ok().json(SuggestionBatch::new(restaurants, true));
    }

    if !data.foursquare.is_configured() {
        return HttpResponse::InternalServerError().json(ErrJsonResp {
            error: "Foursquare API credentials not configured".to_string(),
            message: "Please add FOURSQUARE_CLIENT_ID and FOURSQUARE_CLIENT_SECRET to the .env file"
                .to_string(),
        });
    }

    match data.foursquare.search(lat, lon, radius).await {
        Ok(restaurants) => {
            tracing::info!("fetched {} venues for {key}", restaurants.len());
            data.store(key, restaurants.clone());
            HttpResponse::Ok().json(SuggestionBatch::new(restaurants, false))
        }
        Err(err) => {
            tracing::error!("venue search for {key} failed: {err:#}");
            HttpResponse::InternalServerError().json(ErrJsonResp {
                error: "Failed to fetch data from Foursquare".to_string(),
                message: format!("{err:#}"),
            })
        }
    }
}

#[actix_web::post("/api/clear-cache")]
pub(super) async fn clear_cache(data: web::Data<ApiState>) -> HttpResponse {
    let dropped = data.clear();
    tracing::info!("cleared {dropped} cached searches");
    HttpResponse::Ok().json(MessageResp {
        message: "Cache cleared successfully",
    })
}

#[actix_web::get("/api/health")]
pub(super) async fn health(data: web::Data<ApiState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "api_configured": data.foursquare.is_configured(),
    }))
}

#[actix_web::get("/")]
pub(super) async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Foodie Journal discovery API",
        "endpoints": {
            "health": "/api/health",
            "discover": "/api/discover",
            "clear_cache": "/api/clear-cache (POST)",
        }
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use foodie_journal::discover::area;

    use super::*;
    use crate::foursquare::Credentials;

    fn state(credentials: Option<Credentials>) -> web::Data<ApiState> {
        // nothing listens on the discard port
        let foursquare = Foursquare::new("http://127.0.0.1:9/v2/venues/search", credentials);
        web::Data::new(ApiState::new(foursquare, Duration::from_secs(60)))
    }

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        })
    }

    fn sample() -> Suggestion {
        serde_json::from_value(serde_json::json!({
            "id": "4b5a", "name": "Marufuku Ramen", "cuisine": "Ramen",
            "address": "1581 Webster St", "rating": 4.4, "price": 2, "distance": 0.3
        }))
        .unwrap()
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .service(discover)
                    .service(clear_cache)
                    .service(health)
                    .service(index),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_configuration() {
        let data = state(None);
        let app = app!(data);
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["api_configured"], false);
    }

    #[actix_web::test]
    async fn cached_results_are_served_and_flagged() {
        let data = state(None);
        let japantown = area("japantown").unwrap();
        data.store(
            cache_key(japantown.lat, japantown.lon, japantown.radius),
            vec![sample()],
        );

        let app = app!(data);
        let req = test::TestRequest::get()
            .uri("/api/discover?lat=37.7853&lon=-122.4306&radius=2000")
            .to_request();
        let batch: SuggestionBatch = test::call_and_read_body_json(&app, req).await;
        assert!(batch.cached);
        assert_eq!(batch.count, 1);
        assert_eq!(batch.restaurants, vec![sample()]);
    }

    #[actix_web::test]
    async fn expired_entries_are_ignored() {
        let foursquare = Foursquare::new("http://127.0.0.1:9/v2/venues/search", None);
        let data = web::Data::new(ApiState::new(foursquare, Duration::ZERO));
        data.store(cache_key(1.0, 2.0, 3), vec![sample()]);
        assert!(data.cached(&cache_key(1.0, 2.0, 3)).is_none());
    }

    #[actix_web::test]
    async fn expired_searches_are_evicted() {
        let foursquare = Foursquare::new("http://127.0.0.1:9/v2/venues/search", None);
        let data = web::Data::new(ApiState::new(foursquare, Duration::ZERO));
        for radius in 0..1000 {
            data.store(cache_key(1.0, 2.0, radius), vec![sample()]);
        }
        assert_eq!(data.cache().len(), 1);

        assert!(data.cached(&cache_key(1.0, 2.0, 999)).is_none());
        assert!(data.cache().is_empty());
    }

    #[actix_web::test]
    async fn live_searches_survive_eviction() {
        let data = state(None);
        data.store(cache_key(1.0, 2.0, 3), vec![sample()]);
        data.store(cache_key(4.0, 5.0, 6), vec![sample()]);
        assert_eq!(data.cache().len(), 2);
        assert_eq!(data.cached(&cache_key(1.0, 2.0, 3)), Some(vec![sample()]));
    }

    #[actix_web::test]
    async fn missing_credentials_is_a_server_error() {
        let data = state(None);
        let app = app!(data);
        let req = test::TestRequest::get().uri("/api/discover").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Foursquare API credentials not configured");
    }

    #[actix_web::test]
    async fn upstream_failure_is_a_server_error() {
        let data = state(credentials());
        let app = app!(data);
        let req = test::TestRequest::get().uri("/api/discover").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Failed to fetch data from Foursquare");
    }

    #[actix_web::test]
    async fn clear_cache_forgets_every_search() {
        let data = state(None);
        data.store(cache_key(1.0, 2.0, 3), vec![sample()]);
        data.store(cache_key(4.0, 5.0, 6), vec![sample()]);

        let app = app!(data);
        let req = test::TestRequest::post().uri("/api/clear-cache").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Cache cleared successfully");
        assert!(data.cached(&cache_key(1.0, 2.0, 3)).is_none());

        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["endpoints"]["discover"], "/api/discover");
    }
}

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use foodie_journal::config::Config;
use tracing_subscriber::EnvFilter;

mod api;
mod foursquare;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(true)
        .with_file(false)
        .pretty()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    tracing::info!(?config, "starting discovery server");

    let credentials = match (
        config.foursquare_client_id.clone(),
        config.foursquare_client_secret.clone(),
    ) {
        (Some(client_id), Some(client_secret)) => Some(foursquare::Credentials {
            client_id,
            client_secret,
        }),
        _ => {
            tracing::warn!("FOURSQUARE_CLIENT_ID or FOURSQUARE_CLIENT_SECRET missing, discover requests will fail");
            None
        }
    };
    let foursquare = foursquare::Foursquare::new(foursquare::VENUES_SEARCH_URL, credentials);
    let state = web::Data::new(api::ApiState::new(foursquare, config.cache_ttl));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .service(api::index)
            .service(api::health)
            .service(api::discover)
            .service(api::clear_cache)
    })
    .bind(config.bind.as_str())?
    .run()
    .await?;
    Ok(())
}

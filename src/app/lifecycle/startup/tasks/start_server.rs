use crate::app::handlers::{self, AppState};
use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::AsyncTask;
use anyhow::{Error, anyhow, bail};
use actix_web::{App, HttpServer, web};
use async_trait::async_trait;
use tracing::{info, instrument};

pub struct StartServerTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for StartServerTask {
    #[instrument(skip_all, name = "start_server_task")]
    async fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = match ctx.config.get() {
            Some(config) => config.clone(),
            None => bail!("Config missing during start server task"),
        };

        let pipeline = ctx
            .auction_pipeline
            .get()
            .ok_or(anyhow!("Auction pipeline not built"))?
            .clone();

        let circuits = ctx
            .circuits
            .get()
            .ok_or(anyhow!("Circuit registry not set"))?
            .clone();

        let currency = ctx
            .currency
            .get()
            .ok_or(anyhow!("Currency service not set"))?
            .clone();

        let adapters = ctx
            .adapters
            .get()
            .ok_or(anyhow!("Adapter registry not set"))?
            .clone();

        let store = ctx.store.get().ok_or(anyhow!("Publisher store not set"))?.clone();

        let state = web::Data::new(AppState {
            config: config.clone(),
            pipeline,
            circuits,
            currency,
            adapters,
            store,
            rate_limiter: AppState::build_rate_limiter(config.server.rate_limit_qps),
        });

        let max_body = config.server.max_body_bytes;
        let port = config.server.port;

        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                // oversized intake answers 413 before any handler runs
                .app_data(web::PayloadConfig::new(max_body))
                .app_data(web::JsonConfig::default().limit(max_body))
                .route("/openrtb2/auction", web::post().to(handlers::openrtb::auction))
                .route("/v1/bid", web::post().to(handlers::slots::bid))
                .route("/video/vast", web::get().to(handlers::video::vast_get))
                .route("/video/openrtb", web::post().to(handlers::video::vast_post))
                .route("/cookie_sync", web::post().to(handlers::sync::cookie_sync))
                .route("/health", web::get().to(handlers::admin::health))
                .route("/health/ready", web::get().to(handlers::admin::ready))
                .route("/metrics", web::get().to(handlers::admin::prometheus))
                .route(
                    "/admin/circuit-breaker",
                    web::get().to(handlers::admin::circuits_get),
                )
                .route(
                    "/admin/circuit-breaker",
                    web::post().to(handlers::admin::circuits_post),
                )
                .route("/admin/currency", web::get().to(handlers::admin::currency_get))
        })
        .bind(("0.0.0.0", port))?
        .run();

        let handle = server.handle();

        // the server owns its own worker threads; keep only the handle
        tokio::spawn(server);

        ctx.server
            .set(handle)
            .map_err(|_| anyhow!("Could not set server"))?;

        info!("Started http server on port {}, ready for requests", port);

        Ok(())
    }
}

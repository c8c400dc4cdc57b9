pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use config::Config;
use services::BillingRepository;

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub config: Config,
    pub repository: BillingRepository,
}

pub struct Application {
    port: u16,
    router: Router,
    db: mongodb::Database,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some(config.service_name.clone());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let repository = BillingRepository::new(&db);
        repository.init_indexes().await?;

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            repository,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            // Subscription lifecycle (account-scoped)
            .route(
                "/subscriptions",
                post(handlers::subscriptions::create_subscription),
            )
            .route(
                "/subscriptions/current",
                get(handlers::subscriptions::get_current_subscription),
            )
            .route(
                "/subscriptions/upgrade",
                post(handlers::subscriptions::upgrade_subscription),
            )
            .route(
                "/subscriptions/cancel",
                post(handlers::subscriptions::cancel_subscription),
            )
            .route(
                "/subscriptions/renew",
                post(handlers::subscriptions::renew_subscription),
            )
            // Payments
            .route(
                "/payments",
                post(handlers::payments::create_payment).get(handlers::payments::list_payments),
            )
            .route("/payments/:id", get(handlers::payments::get_payment))
            .route(
                "/payments/:id/complete",
                post(handlers::payments::complete_payment),
            )
            .route("/payments/:id/fail", post(handlers::payments::fail_payment))
            .route(
                "/payments/:id/refund",
                post(handlers::payments::refund_payment),
            )
            // Usage counters
            .route(
                "/usage",
                get(handlers::usage::get_usage).post(handlers::usage::record_usage),
            )
            .route("/usage/release", post(handlers::usage::release_usage))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        Ok(Self {
            port: config.server.port,
            router,
            db,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }
}

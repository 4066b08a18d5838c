//! Alert fan-out and delivery for the AquaWatch surveillance platform.
//!
//! Alerts are persisted on the request path and announced on the event bus;
//! a background consumer pushes them to live listeners and runs the
//! per-subscriber delivery round.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use aquawatch_risk::RiskScorer;
use aquawatch_shared::clients::rabbitmq::RabbitMQClient;
use aquawatch_shared::middleware::JwtSecret;

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod models;
pub mod push;
pub mod resolver;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;
pub mod templates;

use config::AppConfig;
use events::AlertPipeline;
use push::PushHub;
use store::Repository;

pub struct AppState {
    pub config: AppConfig,
    pub repo: Arc<dyn Repository>,
    pub rabbitmq: RabbitMQClient,
    pub hub: PushHub,
    pub pipeline: AlertPipeline,
    pub scorer: Arc<dyn RiskScorer>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl JwtSecret for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    use routes::{alerts, health, risk, subscriptions};

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/:id", get(alerts::get_alert))
        .route("/alerts/:id/acknowledge", post(alerts::acknowledge_alert))
        .route("/alerts/:id/resolve", post(alerts::resolve_alert))
        .route("/alerts/:id/dispatch", post(alerts::dispatch_alert))
        .route("/alerts/:id/deliveries", get(alerts::list_deliveries))
        .route(
            "/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route("/subscriptions/:id", delete(subscriptions::delete_subscription))
        .route("/risk/assess", post(risk::assess))
        .route("/ws/alerts/user/:id", get(push::ws::user_stream))
        .route("/ws/alerts/village/:id", get(push::ws::village_stream))
        .route("/ws/alerts/district/:id", get(push::ws::district_stream))
        .route("/ws/alerts/dashboard/:id", get(push::ws::district_stream))
        .route("/ws/alerts/state/:id", get(push::ws::state_stream))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(aquawatch_shared::middleware::metrics_middleware)),
        )
        .with_state(state)
}

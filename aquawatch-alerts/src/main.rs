use std::sync::Arc;

use aquawatch_alerts::channels::ChannelRegistry;
use aquawatch_alerts::config::AppConfig;
use aquawatch_alerts::dispatcher::Dispatcher;
use aquawatch_alerts::events::{self, AlertPipeline};
use aquawatch_alerts::push::PushHub;
use aquawatch_alerts::store::{PgStore, Repository};
use aquawatch_alerts::AppState;
use aquawatch_risk::{ModelRegistry, ModelScorer};
use aquawatch_shared::clients::db::create_pool;
use aquawatch_shared::clients::rabbitmq::RabbitMQClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aquawatch_shared::middleware::init_tracing("aquawatch-alerts");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = aquawatch_shared::middleware::init_metrics()?;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let repo: Arc<dyn Repository> = Arc::new(PgStore::new(pool));

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;

    let hub = PushHub::new(config.push_channel_capacity);
    let channels = ChannelRegistry::from_config(&config, hub.clone())?;
    let dispatcher = Dispatcher::new(repo.clone(), channels);
    let pipeline = AlertPipeline::new(repo.clone(), hub.clone(), dispatcher);

    let scorer = Arc::new(ModelScorer::new(ModelRegistry::new(&config.model_dir)));
    tracing::info!(model_dir = %config.model_dir, "risk scorer ready");

    let state = Arc::new(AppState {
        config,
        repo,
        rabbitmq,
        hub,
        pipeline,
        scorer,
        metrics_handle,
    });

    // Spawn alert event subscriber
    let events_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_alert_events(events_state).await {
            tracing::error!(error = %e, "alert event subscriber failed");
        }
    });

    let app = aquawatch_alerts::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "aquawatch-alerts starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

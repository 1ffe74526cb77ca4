use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flowgate::config::{load_config, Settings, TaskStoreSettings};
use flowgate::{AgentRegistry, InMemoryTaskStore, RedisTaskStore, TaskStore};
use flowgate_axum::GatewayServer;

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    if settings.log_pretty {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&settings.config_path)?;
    info!(
        environment = %settings.environment,
        agents = config.agents.len(),
        config = %settings.config_path.display(),
        "configuration loaded"
    );

    let registry = Arc::new(AgentRegistry::new(config.agents, &settings.base_url)?);

    let store: Arc<dyn TaskStore> = match &settings.task_store {
        TaskStoreSettings::Memory => Arc::new(InMemoryTaskStore::new()),
        TaskStoreSettings::Redis {
            url,
            ttl_secs,
            prefix,
        } => Arc::new(RedisTaskStore::connect(url, prefix, *ttl_secs).await?),
    };

    let server = GatewayServer::new(registry, store)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    server.serve(addr).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            process::exit(1);
        }
    };
    init_tracing(&settings);

    if let Err(err) = run(settings).await {
        error!(error = %err, "gateway failed to start");
        process::exit(1);
    }
}

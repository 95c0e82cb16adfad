//! Disciple server - presence registry and admin control plane

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disciple_server::{
    config::Args,
    db::{Disciple, DiscipleModel, DocumentStore, MemoryStore, MongoClient},
    registry::{DiscipleRegistry, ModelRegistry},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("disciple_server={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Disciple Server");
    info!("======================================");
    info!("Disciple listener: {}", args.disciple_addr());
    match args.admin_addr() {
        Some(addr) => info!("Admin listener: {}", addr),
        None => info!("Admin listener: disabled"),
    }
    if args.memory_store {
        info!("Store: in-memory");
    } else {
        info!("Store: MongoDB {} (db '{}')", args.mongodb_uri, args.mongodb_db);
    }
    info!("======================================");

    let (disciple_store, model_store) = connect_stores(&args).await?;

    let disciples = DiscipleRegistry::new(disciple_store);
    let models = ModelRegistry::new(model_store);

    // No session survives a restart
    disciples.startup_reset().await;

    let state = Arc::new(AppState::new(args, disciples, models));

    tokio::select! {
        result = server::run(state) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Disciple server stopped");
    Ok(())
}

type Stores = (
    Arc<dyn DocumentStore<Disciple>>,
    Arc<dyn DocumentStore<DiscipleModel>>,
);

async fn connect_stores(args: &Args) -> anyhow::Result<Stores> {
    if args.memory_store {
        warn!("Using in-memory store - records are lost on restart");
        let disciples: Arc<dyn DocumentStore<Disciple>> = Arc::new(MemoryStore::<Disciple>::new());
        let models: Arc<dyn DocumentStore<DiscipleModel>> = Arc::new(MemoryStore::<DiscipleModel>::new());
        return Ok((disciples, models));
    }

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            return Err(e.into());
        }
    };

    let disciples: Arc<dyn DocumentStore<Disciple>> = Arc::new(mongo.store::<Disciple>().await?);
    let models: Arc<dyn DocumentStore<DiscipleModel>> = Arc::new(mongo.store::<DiscipleModel>().await?);
    Ok((disciples, models))
}

//! tour-booking binary: serves the API, or seeds and clears collections for development.

use clap::{Parser, Subcommand};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tour_booking::{
    apply_migrations, auth, build_router, ensure_database_exists, load_catalog, service::ratings, AppError, AppState,
    Catalog, DocumentStore, MemoryStore, PgStore, ResourceKind, Settings, StoreBackend,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tour-booking", version, about = "Tour booking REST backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default if no subcommand specified)
    Serve,
    /// Insert every document of a JSON array file into a resource
    Import {
        /// Resource name: tours, users, reviews or bookings
        #[arg(short, long)]
        resource: String,
        /// JSON file holding an array of documents
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Remove every document of a resource
    Delete {
        #[arg(short, long)]
        resource: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tour_booking=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let catalog = load_catalog(settings.catalog_path.as_deref()).await?;
    let store = open_store(&settings, &catalog).await?;
    let state = AppState::new(store, catalog, settings);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state).await,
        Commands::Import { resource, file } => import(&state, &resource, &file).await,
        Commands::Delete { resource } => {
            let kind = resource_kind(&resource)?;
            let removed = state.resource(kind).delete_all().await?;
            tracing::info!(resource = %kind.name(), removed, "data deleted");
            Ok(())
        }
    }
}

async fn open_store(settings: &Settings, catalog: &Catalog) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    match settings.store {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = PgPoolOptions::new()
                .max_connections(settings.db_max_connections)
                .connect(&settings.database_url)
                .await?;
            apply_migrations(&pool, catalog).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

async fn serve(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = state.settings.bind_addr.clone();
    let app = build_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn resource_kind(name: &str) -> Result<ResourceKind, Box<dyn std::error::Error>> {
    ResourceKind::ALL
        .into_iter()
        .find(|k| k.name() == name)
        .ok_or_else(|| format!("unknown resource: {}", name).into())
}

/// Seed documents skip request validation. Plain-text user passwords are hashed on the way in,
/// and imported reviews refresh the ratings of the tours they name.
async fn import(state: &AppState, resource: &str, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let kind = resource_kind(resource)?;
    let raw = tokio::fs::read_to_string(file).await?;
    let docs: Vec<Value> = serde_json::from_str(&raw)?;
    let target = state.resource(kind);
    let mut touched_tours = BTreeSet::new();
    for mut doc in docs {
        if kind == ResourceKind::Users {
            hash_seed_password(&mut doc)?;
        }
        let created = target.import_one(doc).await?;
        if let Some(tour) = created.get("tour").and_then(Value::as_str) {
            touched_tours.insert(tour.to_string());
        }
    }
    if kind == ResourceKind::Reviews {
        let tours = state.resource(ResourceKind::Tours);
        for tour_id in &touched_tours {
            ratings::recalculate_tour_ratings(&target, &tours, tour_id).await?;
        }
    }
    tracing::info!(resource = %kind.name(), file = %file.display(), "data imported");
    Ok(())
}

fn hash_seed_password(doc: &mut Value) -> Result<(), AppError> {
    if let Some(obj) = doc.as_object_mut() {
        if let Some(plain) = obj.get("password").and_then(Value::as_str) {
            if !auth::password::is_password_hash(plain) {
                let hashed = auth::hash_password(plain)?;
                obj.insert("password".into(), Value::String(hashed));
            }
        }
    }
    Ok(())
}

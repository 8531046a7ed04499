use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use zonemap::config::Config;
use zonemap::db;
use zonemap::error::SyncError;
use zonemap::state::AppState;
use zonemap::store::pg::PgStore;
use zonemap::store::{Store, TrashedZone};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Sync(#[from] SyncError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "zonemap", about = "Campaign zone map maintenance")]
struct Cli {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations, including zone tombstones.
    Migrate,
    /// List a map's active zones.
    Zones { map_id: Uuid },
    /// List a map's trashed zones.
    Trashed { map_id: Uuid },
    /// Move a zone to the trash (or delete it on schemas without tombstones).
    Trash {
        zone_id: Uuid,
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        actor: Option<Uuid>,
    },
    /// Bring a trashed zone back.
    Restore {
        zone_id: Uuid,
        #[arg(long)]
        campaign: Uuid,
    },
    /// Delete a link between two nodes.
    Unlink {
        link_id: Uuid,
        #[arg(long)]
        campaign: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    if matches!(cli.command, Command::Migrate) {
        db::init_pool(&cli.database_url, config.db_max_connections).await?;
        tracing::info!("migrations applied");
        return Ok(());
    }

    let pool = db::connect(&cli.database_url, config.db_max_connections).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let state = AppState::new(store, config);

    match cli.command {
        Command::Migrate => Ok(()),
        Command::Zones { map_id } => {
            let zones = state.store.list_zones(map_id).await.map_err(SyncError::from)?;
            print_json(&Value::Array(zones.iter().map(zone_json).collect()))
        }
        Command::Trashed { map_id } => {
            let trashed = state.trash.list_trashed(map_id).await?;
            print_json(&Value::Array(trashed.iter().map(trashed_json).collect()))
        }
        Command::Trash { zone_id, campaign, actor } => {
            let removal = state.trash.delete_zone(campaign, zone_id, actor).await?;
            print_json(&json!({ "zone_id": zone_id, "removal": format!("{removal:?}") }))
        }
        Command::Restore { zone_id, campaign } => {
            let zone = state.trash.restore_zone(campaign, zone_id).await?;
            print_json(&zone_json(&zone))
        }
        Command::Unlink { link_id, campaign } => {
            state.zones().remove_link(campaign, link_id).await?;
            print_json(&json!({ "link_id": link_id, "removed": true }))
        }
    }
}

fn zone_json(zone: &canvas::doc::Zone) -> Value {
    json!({
        "id": zone.id,
        "node_id": zone.node_id,
        "target_node_id": zone.target_node_id,
        "shape": zone.shape.kind(),
        "geometry": zone.shape.to_value(),
        "is_visible": zone.is_visible,
        "action": zone.action.as_str(),
        "sort_index": zone.sort_index,
    })
}

fn trashed_json(trashed: &TrashedZone) -> Value {
    let mut value = zone_json(&trashed.zone);
    value["deleted_at"] = json!(trashed.tombstone.at.unix_timestamp());
    value["deleted_by"] = json!(trashed.tombstone.by);
    value
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

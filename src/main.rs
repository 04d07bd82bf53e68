use std::sync::Arc;

use chrono::NaiveTime;
use tracing::info;

use worqplace::config::Config;
use worqplace::engine::{room_availability, today, Engine};
use worqplace::model::Timeslot;
use worqplace::repository::Repository;
use worqplace::store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    worqplace::observability::init(config.metrics_port)?;

    let store = match config.journal_path() {
        Some(path) => {
            if let Some(dir) = &config.data_dir {
                std::fs::create_dir_all(dir)?;
            }
            Arc::new(InMemoryStore::open(&path)?)
        }
        None => Arc::new(InMemoryStore::new()),
    };

    let today = today();
    let locations = store.locations();
    info!("worqplace loaded");
    info!(
        "  journal: {}",
        config
            .journal_path()
            .map_or("disabled".to_string(), |p| p.display().to_string())
    );
    info!("  locations: {}", locations.len());
    info!("  rooms: {}", store.room_count());
    info!("  reservations: {}", store.reservation_count());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let engine = Engine::new(store.clone());
    info!("  active reservations: {}", engine.all_reservations(false).await?.len());

    let start = NaiveTime::from_hms_opt(0, 0, 0).ok_or("invalid start of day")?;
    let end = NaiveTime::from_hms_opt(23, 59, 59).ok_or("invalid end of day")?;
    let whole_day = Timeslot::new(today, start, end);
    for location in &locations {
        for room in engine.repository().load_rooms_by_location(location.id).await? {
            let line = serde_json::json!({
                "date": today,
                "location": location.name,
                "room": room_availability(&room, &whole_day),
            });
            println!("{line}");
        }
    }

    let appends = store.appends_since_compact().await;
    if appends >= config.compact_threshold {
        info!("journal has {appends} appends since last compaction, compacting");
        store.compact().await?;
    }

    Ok(())
}

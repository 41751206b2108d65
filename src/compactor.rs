use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::observability;

/// Compact once at least `threshold` events were appended since the last run.
/// Returns whether a compaction happened.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that periodically checks the WAL and compacts it.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        if !compact_if_needed(&engine, threshold).await {
            debug!("compactor: below threshold");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NewVehicle;
    use crate::model::*;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("fleetbook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn new_vehicle(plate: &str) -> NewVehicle {
        NewVehicle {
            make: "Skoda".into(),
            model: "Fabia".into(),
            license_plate: plate.into(),
            color: None,
            fuel_type: FuelType::Petrol,
            seating_capacity: 5,
            transmission: Transmission::Manual,
            status: None,
            odometer: None,
            last_service_date: None,
            next_service_date: None,
            technical_inspection_expiry: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let engine = Engine::new(path.clone()).unwrap();
        let admin = engine.bootstrap("admin", "admin@example.com").await.unwrap().unwrap();
        let actor = engine.actor_for(admin.id).unwrap();

        // 2 roles + 1 user so far
        assert!(!compact_if_needed(&engine, 10).await);

        for i in 0..8 {
            engine
                .create_vehicle(&actor, new_vehicle(&format!("1AB {i:04}")))
                .await
                .unwrap();
        }
        assert!(compact_if_needed(&engine, 10).await);
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        drop(engine);
        let reloaded = Engine::new(path).unwrap();
        assert_eq!(reloaded.snapshot().await.vehicles.len(), 8);
        assert!(reloaded.actor_for(admin.id).is_some());
    }
}

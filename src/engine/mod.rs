mod availability;
mod directory;
mod error;
mod fleet;
pub mod policy;
mod queries;
mod records;
mod reservations;

pub use availability::{free_windows, merge_overlapping, subtract_intervals};
pub use directory::{NewRole, NewUser, RolePatch, UserPatch};
pub use error::{Conflict, EngineError, Entity, Rule};
pub use fleet::{NewVehicle, VehicleFilter, VehiclePatch};
pub use queries::{Availability, ReservationFilter};
pub use records::{DamagePatch, NewDamageRecord, NewServiceRecord, ServicePatch};
pub use reservations::{NewReservation, ReservationPatch};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tracing::{error, warn};
use ulid::Ulid;

use crate::limits::MAX_LOCK_RETRIES;
use crate::model::*;
use crate::observability;
use crate::wal::Wal;

pub type SharedVehicleState = Arc<RwLock<VehicleState>>;
pub(crate) type VehicleGuard = OwnedRwLockWriteGuard<VehicleState>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = Vec<(Event, oneshot::Sender<io::Result<()>>)>;

/// Owns the WAL. Each wakeup drains every append already queued, buffers the
/// lot, and answers all of them after a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, &mut batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Pending) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        warn!("WAL flush failed for {} events: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

/// All-or-nothing: a failed batch is cut back to the last committed frame.
fn flush_batch(wal: &mut Wal, batch: &Pending) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err()
        && let Err(e) = wal.rollback()
    {
        error!("WAL rollback failed, log may hold a partial frame: {e}");
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// A consistent-enough copy of everything, for reports and compaction.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub vehicles: Vec<Vehicle>,
    pub reservations: Vec<Reservation>,
    pub users: Vec<User>,
    pub roles: Vec<RoleRecord>,
    pub service_records: Vec<ServiceRecord>,
    pub damage_records: Vec<DamageRecord>,
}

pub struct Engine {
    pub(super) vehicles: DashMap<Ulid, SharedVehicleState>,
    /// Reservation id → vehicle id currently holding it.
    pub(super) reservation_index: DashMap<Ulid, Ulid>,
    /// Normalized license plate → vehicle id.
    pub(super) plates: DashMap<String, Ulid>,
    pub(super) users: DashMap<Ulid, User>,
    pub(super) roles: DashMap<Ulid, RoleRecord>,
    pub(super) service_records: DashMap<Ulid, ServiceRecord>,
    pub(super) damage_records: DashMap<Ulid, DamageRecord>,
    /// Serializes catalog mutations (uniqueness checks, records, vehicles).
    /// Always taken before any vehicle lock.
    pub(super) catalog: Mutex<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

pub(crate) fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

/// Vehicles whose locked state an event touches.
fn event_vehicle_ids(event: &Event) -> Vec<Ulid> {
    match event {
        Event::ReservationCreated { reservation } | Event::ReservationUpdated { reservation } => {
            vec![reservation.vehicle_id]
        }
        Event::ReservationMoved {
            reservation,
            from_vehicle_id,
        } => vec![*from_vehicle_id, reservation.vehicle_id],
        Event::ReservationCancelled { vehicle_id, .. }
        | Event::ServiceRecordDeleted { vehicle_id, .. } => vec![*vehicle_id],
        Event::VehicleUpdated { vehicle } => vec![vehicle.id],
        Event::ServiceRecordSaved { record, .. } => vec![record.vehicle_id],
        Event::VehicleCreated { .. }
        | Event::RoleCreated { .. }
        | Event::RoleUpdated { .. }
        | Event::RoleDeleted { .. }
        | Event::UserCreated { .. }
        | Event::UserUpdated { .. }
        | Event::DamageRecordSaved { .. }
        | Event::DamageRecordDeleted { .. } => Vec::new(),
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            vehicles: DashMap::new(),
            reservation_index: DashMap::new(),
            plates: DashMap::new(),
            users: DashMap::new(),
            roles: DashMap::new(),
            service_records: DashMap::new(),
            damage_records: DashMap::new(),
            catalog: Mutex::new(()),
            wal_tx,
        };

        // Sole owner of every lock here, so try_write never contends.
        for event in &events {
            if let Event::VehicleCreated { vehicle } = event {
                engine.install_vehicle(vehicle.clone());
                continue;
            }
            for vehicle_id in event_vehicle_ids(event) {
                if let Some(shared) = engine.vehicle_state(&vehicle_id)
                    && let Ok(mut guard) = shared.try_write()
                {
                    engine.apply_to_vehicle(&mut guard, event);
                }
            }
            engine.apply_catalog(event);
        }
        tracing::debug!(
            "replayed {} events: {} vehicles, {} reservations, {} users",
            events.len(),
            engine.vehicles.len(),
            engine.reservation_index.len(),
            engine.users.len()
        );

        Ok(engine)
    }

    pub(super) fn install_vehicle(&self, vehicle: Vehicle) {
        self.plates
            .insert(normalize_plate(&vehicle.license_plate), vehicle.id);
        self.vehicles
            .insert(vehicle.id, Arc::new(RwLock::new(VehicleState::new(vehicle))));
    }

    /// Apply an event to one vehicle's state. Caller holds its write lock.
    pub(super) fn apply_to_vehicle(&self, vs: &mut VehicleState, event: &Event) {
        let here = vs.vehicle.id;
        match event {
            Event::ReservationCreated { reservation } if reservation.vehicle_id == here => {
                self.reservation_index.insert(reservation.id, here);
                vs.insert_reservation(reservation.clone());
            }
            Event::ReservationUpdated { reservation } if reservation.vehicle_id == here => {
                vs.replace_reservation(reservation.clone());
            }
            Event::ReservationMoved {
                reservation,
                from_vehicle_id,
            } => {
                if *from_vehicle_id == here {
                    vs.remove_reservation(reservation.id);
                }
                if reservation.vehicle_id == here {
                    self.reservation_index.insert(reservation.id, here);
                    vs.insert_reservation(reservation.clone());
                }
            }
            Event::ReservationCancelled { id, vehicle_id, at } if *vehicle_id == here => {
                if let Some(existing) = vs.reservation(id) {
                    let mut cancelled = existing.clone();
                    cancelled.status = ReservationStatus::Cancelled;
                    cancelled.updated_at = *at;
                    vs.replace_reservation(cancelled);
                }
            }
            Event::VehicleUpdated { vehicle } if vehicle.id == here => {
                let old_plate = normalize_plate(&vs.vehicle.license_plate);
                let new_plate = normalize_plate(&vehicle.license_plate);
                if old_plate != new_plate {
                    self.plates.remove(&old_plate);
                    self.plates.insert(new_plate, here);
                }
                vs.vehicle = vehicle.clone();
            }
            Event::ServiceRecordSaved {
                record,
                last_service_date,
            } if record.vehicle_id == here => {
                vs.vehicle.last_service_date = *last_service_date;
            }
            Event::ServiceRecordDeleted {
                vehicle_id,
                last_service_date,
                ..
            } if *vehicle_id == here => {
                vs.vehicle.last_service_date = *last_service_date;
            }
            _ => {}
        }
    }

    /// Apply the parts of an event that live outside vehicle locks.
    pub(super) fn apply_catalog(&self, event: &Event) {
        match event {
            Event::RoleCreated { role } | Event::RoleUpdated { role } => {
                self.roles.insert(role.id, role.clone());
            }
            Event::RoleDeleted { id } => {
                self.roles.remove(id);
            }
            Event::UserCreated { user } | Event::UserUpdated { user } => {
                self.users.insert(user.id, user.clone());
            }
            Event::ServiceRecordSaved { record, .. } => {
                self.service_records.insert(record.id, record.clone());
            }
            Event::ServiceRecordDeleted { id, .. } => {
                self.service_records.remove(id);
            }
            Event::DamageRecordSaved { record } => {
                self.damage_records.insert(record.id, record.clone());
            }
            Event::DamageRecordDeleted { id } => {
                self.damage_records.remove(id);
            }
            _ => {}
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Make the event durable, then apply it to the given locked vehicles and
    /// the catalog maps.
    pub(super) async fn persist_and_apply(
        &self,
        locked: &mut [&mut VehicleState],
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        for vs in locked.iter_mut() {
            self.apply_to_vehicle(vs, event);
        }
        self.apply_catalog(event);
        Ok(())
    }

    pub fn vehicle_state(&self, id: &Ulid) -> Option<SharedVehicleState> {
        self.vehicles.get(id).map(|e| e.value().clone())
    }

    pub(super) async fn lock_vehicle(&self, id: Ulid) -> Result<VehicleGuard, EngineError> {
        let shared = self
            .vehicle_state(&id)
            .ok_or(EngineError::NotFound(Entity::Vehicle, id))?;
        Ok(shared.write_owned().await)
    }

    /// Lock two distinct vehicles in id order. Guards come back as `(a, b)`.
    pub(super) async fn lock_pair(
        &self,
        a: Ulid,
        b: Ulid,
    ) -> Result<(VehicleGuard, VehicleGuard), EngineError> {
        let shared_a = self
            .vehicle_state(&a)
            .ok_or(EngineError::NotFound(Entity::Vehicle, a))?;
        let shared_b = self
            .vehicle_state(&b)
            .ok_or(EngineError::NotFound(Entity::Vehicle, b))?;
        if a < b {
            let ga = shared_a.write_owned().await;
            let gb = shared_b.write_owned().await;
            Ok((ga, gb))
        } else {
            let gb = shared_b.write_owned().await;
            let ga = shared_a.write_owned().await;
            Ok((ga, gb))
        }
    }

    /// Lookup reservation → vehicle, lock it, and confirm the reservation is
    /// still there. An edit may move it between lookup and lock; retry then.
    pub(super) async fn resolve_reservation_write(
        &self,
        id: Ulid,
    ) -> Result<(VehicleGuard, Reservation), EngineError> {
        for _ in 0..MAX_LOCK_RETRIES {
            let vehicle_id = self
                .reservation_index
                .get(&id)
                .map(|e| *e.value())
                .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
            let guard = self.lock_vehicle(vehicle_id).await?;
            if let Some(current) = guard.reservation(&id).cloned() {
                return Ok((guard, current));
            }
        }
        Err(EngineError::NotFound(Entity::Reservation, id))
    }

    /// Point-in-time copy of all state. Vehicles are read one lock at a time.
    pub async fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::default();
        for shared in self.sorted_vehicle_states() {
            let guard = shared.read().await;
            snap.vehicles.push(guard.vehicle.clone());
            snap.reservations.extend(guard.reservations.iter().cloned());
        }
        snap.users = self.users.iter().map(|e| e.value().clone()).collect();
        snap.roles = self.roles.iter().map(|e| e.value().clone()).collect();
        snap.service_records = self
            .service_records
            .iter()
            .map(|e| e.value().clone())
            .collect();
        snap.damage_records = self
            .damage_records
            .iter()
            .map(|e| e.value().clone())
            .collect();
        snap
    }

    fn sorted_vehicle_states(&self) -> Vec<SharedVehicleState> {
        let mut ids: Vec<Ulid> = self.vehicles.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids.iter().filter_map(|id| self.vehicle_state(id)).collect()
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    ///
    /// Holds the catalog lock and a read lock on every vehicle until the new
    /// file is in place, so no mutation can land in the discarded log.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;
        let mut guards = Vec::new();
        for shared in self.sorted_vehicle_states() {
            guards.push(shared.read_owned().await);
        }

        let mut events = Vec::new();
        let mut roles: Vec<RoleRecord> = self.roles.iter().map(|e| e.value().clone()).collect();
        roles.sort_by_key(|r| r.id);
        events.extend(roles.into_iter().map(|role| Event::RoleCreated { role }));
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        events.extend(users.into_iter().map(|user| Event::UserCreated { user }));

        for guard in &guards {
            events.push(Event::VehicleCreated {
                vehicle: guard.vehicle.clone(),
            });
            events.extend(guard.reservations.iter().map(|r| Event::ReservationCreated {
                reservation: r.clone(),
            }));
        }

        let mut services: Vec<ServiceRecord> = self
            .service_records
            .iter()
            .map(|e| e.value().clone())
            .collect();
        services.sort_by_key(|r| r.id);
        for record in services {
            let last_service_date = guards
                .iter()
                .find(|g| g.vehicle.id == record.vehicle_id)
                .and_then(|g| g.vehicle.last_service_date);
            events.push(Event::ServiceRecordSaved {
                record,
                last_service_date,
            });
        }
        let mut damages: Vec<DamageRecord> = self
            .damage_records
            .iter()
            .map(|e| e.value().clone())
            .collect();
        damages.sort_by_key(|r| r.id);
        events.extend(damages.into_iter().map(|record| Event::DamageRecordSaved { record }));

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

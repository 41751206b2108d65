use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::access::Capability;
use crate::limits::*;
use crate::model::*;

use super::error::{Entity, Rule};
use super::policy::{self, now_ms};
use super::{Engine, EngineError, normalize_plate};

#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub license_plate: String,
    pub color: Option<String>,
    pub fuel_type: FuelType,
    pub seating_capacity: u32,
    pub transmission: Transmission,
    pub status: Option<VehicleStatus>,
    pub odometer: Option<u32>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_date: Option<NaiveDate>,
    pub technical_inspection_expiry: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VehiclePatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub fuel_type: Option<FuelType>,
    pub seating_capacity: Option<u32>,
    pub transmission: Option<Transmission>,
    pub status: Option<VehicleStatus>,
    pub odometer: Option<u32>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_date: Option<NaiveDate>,
    pub technical_inspection_expiry: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub status: Option<VehicleStatus>,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    pub include_archived: bool,
}

impl VehicleFilter {
    fn matches(&self, v: &Vehicle) -> bool {
        (self.include_archived || !v.is_archived)
            && self.status.is_none_or(|s| v.status == s)
            && self.fuel_type.is_none_or(|f| v.fuel_type == f)
            && self.transmission.is_none_or(|t| v.transmission == t)
    }
}

fn check_seating_capacity(seats: u32) -> Result<(), EngineError> {
    if !(1..=MAX_SEATING_CAPACITY).contains(&seats) {
        return Err(Rule::SeatingCapacity(seats).into());
    }
    Ok(())
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl Engine {
    pub async fn create_vehicle(&self, actor: &Actor, req: NewVehicle) -> Result<Vehicle, EngineError> {
        policy::require(actor, Capability::ManageFleet)?;
        policy::check_required("make", &req.make, MAX_NAME_LEN)?;
        policy::check_required("model", &req.model, MAX_NAME_LEN)?;
        policy::check_required("license_plate", &req.license_plate, MAX_NAME_LEN)?;
        policy::check_optional("color", req.color.as_deref(), MAX_NAME_LEN)?;
        policy::check_optional("notes", req.notes.as_deref(), MAX_NOTES_LEN)?;
        check_seating_capacity(req.seating_capacity)?;

        let _catalog = self.catalog.lock().await;
        let plate = normalize_plate(&req.license_plate);
        if self.plates.contains_key(&plate) {
            return Err(EngineError::duplicate("license_plate", plate));
        }

        let now = now_ms();
        let vehicle = Vehicle {
            id: Ulid::new(),
            make: req.make.trim().to_string(),
            model: req.model.trim().to_string(),
            license_plate: plate,
            color: non_empty(req.color),
            fuel_type: req.fuel_type,
            seating_capacity: req.seating_capacity,
            transmission: req.transmission,
            status: req.status.unwrap_or(VehicleStatus::Active),
            odometer: req.odometer,
            last_service_date: req.last_service_date,
            next_service_date: req.next_service_date,
            technical_inspection_expiry: req.technical_inspection_expiry,
            notes: non_empty(req.notes),
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        let event = Event::VehicleCreated {
            vehicle: vehicle.clone(),
        };
        self.wal_append(&event).await?;
        self.install_vehicle(vehicle.clone());
        info!("vehicle {} created: {}", vehicle.id, vehicle.display_name());
        Ok(vehicle)
    }

    pub async fn update_vehicle(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: VehiclePatch,
    ) -> Result<Vehicle, EngineError> {
        policy::require(actor, Capability::ManageFleet)?;
        let _catalog = self.catalog.lock().await;
        let mut guard = self.lock_vehicle(id).await?;
        let mut next = guard.vehicle.clone();

        if let Some(make) = patch.make {
            policy::check_required("make", &make, MAX_NAME_LEN)?;
            next.make = make.trim().to_string();
        }
        if let Some(model) = patch.model {
            policy::check_required("model", &model, MAX_NAME_LEN)?;
            next.model = model.trim().to_string();
        }
        if let Some(plate) = patch.license_plate {
            policy::check_required("license_plate", &plate, MAX_NAME_LEN)?;
            let plate = normalize_plate(&plate);
            if let Some(owner) = self.plates.get(&plate)
                && *owner.value() != id
            {
                return Err(EngineError::duplicate("license_plate", plate));
            }
            next.license_plate = plate;
        }
        if let Some(color) = patch.color {
            policy::check_optional("color", Some(&color), MAX_NAME_LEN)?;
            next.color = non_empty(Some(color));
        }
        if let Some(seats) = patch.seating_capacity {
            check_seating_capacity(seats)?;
            next.seating_capacity = seats;
        }
        if let Some(notes) = patch.notes {
            policy::check_optional("notes", Some(&notes), MAX_NOTES_LEN)?;
            next.notes = non_empty(Some(notes));
        }
        next.fuel_type = patch.fuel_type.unwrap_or(next.fuel_type);
        next.transmission = patch.transmission.unwrap_or(next.transmission);
        next.status = patch.status.unwrap_or(next.status);
        next.odometer = patch.odometer.or(next.odometer);
        next.last_service_date = patch.last_service_date.or(next.last_service_date);
        next.next_service_date = patch.next_service_date.or(next.next_service_date);
        next.technical_inspection_expiry = patch
            .technical_inspection_expiry
            .or(next.technical_inspection_expiry);
        next.updated_at = now_ms();

        let event = Event::VehicleUpdated {
            vehicle: next.clone(),
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!("vehicle {id} updated");
        Ok(next)
    }

    pub async fn archive_vehicle(&self, actor: &Actor, id: Ulid) -> Result<Vehicle, EngineError> {
        self.set_archived(actor, id, true).await
    }

    /// Unarchiving also puts the vehicle back into service.
    pub async fn unarchive_vehicle(&self, actor: &Actor, id: Ulid) -> Result<Vehicle, EngineError> {
        self.set_archived(actor, id, false).await
    }

    async fn set_archived(&self, actor: &Actor, id: Ulid, archived: bool) -> Result<Vehicle, EngineError> {
        policy::require(actor, Capability::ManageFleet)?;
        let _catalog = self.catalog.lock().await;
        let mut guard = self.lock_vehicle(id).await?;
        let mut next = guard.vehicle.clone();
        next.is_archived = archived;
        if !archived {
            next.status = VehicleStatus::Active;
        }
        next.updated_at = now_ms();

        let event = Event::VehicleUpdated {
            vehicle: next.clone(),
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!("vehicle {id} {}", if archived { "archived" } else { "unarchived" });
        Ok(next)
    }

    pub async fn get_vehicle(&self, id: Ulid) -> Result<Vehicle, EngineError> {
        let shared = self
            .vehicle_state(&id)
            .ok_or(EngineError::NotFound(Entity::Vehicle, id))?;
        let guard = shared.read().await;
        Ok(guard.vehicle.clone())
    }

    /// Sorted by make, model, then plate.
    pub async fn list_vehicles(&self, filter: &VehicleFilter) -> Vec<Vehicle> {
        let shared: Vec<_> = self.vehicles.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for vs in shared {
            let guard = vs.read().await;
            if filter.matches(&guard.vehicle) {
                out.push(guard.vehicle.clone());
            }
        }
        out.sort_by(|a, b| {
            (a.make.as_str(), a.model.as_str(), a.license_plate.as_str()).cmp(&(
                b.make.as_str(),
                b.model.as_str(),
                b.license_plate.as_str(),
            ))
        });
        out
    }
}

use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::access::Capability;
use crate::limits::*;
use crate::model::*;

use super::error::{Entity, Rule};
use super::policy::{self, now_ms};
use super::{Engine, EngineError};

#[derive(Debug, Clone)]
pub struct NewServiceRecord {
    pub vehicle_id: Ulid,
    pub service_date: NaiveDate,
    pub service_type: String,
    pub description: String,
    pub cost: Option<f64>,
    pub service_provider: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ServicePatch {
    pub service_date: Option<NaiveDate>,
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub service_provider: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDamageRecord {
    pub vehicle_id: Ulid,
    pub damage_date: NaiveDate,
    pub description: String,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub repair_status: Option<RepairStatus>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DamagePatch {
    pub damage_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub repair_status: Option<RepairStatus>,
    pub photos: Option<Vec<String>>,
}

fn check_cost(field: &'static str, cost: Option<f64>) -> Result<(), EngineError> {
    match cost {
        Some(c) if !c.is_finite() || c < 0.0 => Err(Rule::NegativeCost(field).into()),
        _ => Ok(()),
    }
}

fn check_photos(photos: &[String]) -> Result<(), EngineError> {
    if photos.len() > MAX_PHOTOS {
        return Err(Rule::TooManyPhotos(photos.len()).into());
    }
    for photo in photos {
        policy::check_required("photos", photo, MAX_SHORT_TEXT_LEN)?;
    }
    Ok(())
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl Engine {
    /// Newest service date on record for a vehicle once `replaced` (if any)
    /// stands in for its stored version and `removed` is gone.
    fn newest_record_date(
        &self,
        vehicle_id: Ulid,
        replaced: Option<&ServiceRecord>,
        removed: Option<Ulid>,
    ) -> Option<NaiveDate> {
        let stored = self
            .service_records
            .iter()
            .filter(|r| r.vehicle_id == vehicle_id)
            .filter(|r| Some(r.id) != removed && Some(r.id) != replaced.map(|n| n.id))
            .map(|r| r.service_date)
            .max();
        stored.max(replaced.map(|r| r.service_date))
    }

    // ── Service records ──────────────────────────────────────────

    pub async fn create_service_record(
        &self,
        actor: &Actor,
        req: NewServiceRecord,
    ) -> Result<ServiceRecord, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        policy::check_required("service_type", &req.service_type, MAX_NAME_LEN)?;
        policy::check_required("description", &req.description, MAX_NOTES_LEN)?;
        policy::check_optional("service_provider", req.service_provider.as_deref(), MAX_SHORT_TEXT_LEN)?;
        check_cost("cost", req.cost)?;

        let _catalog = self.catalog.lock().await;
        let mut guard = self.lock_vehicle(req.vehicle_id).await?;
        let now = now_ms();
        let record = ServiceRecord {
            id: Ulid::new(),
            vehicle_id: req.vehicle_id,
            service_date: req.service_date,
            service_type: req.service_type.trim().to_string(),
            description: req.description.trim().to_string(),
            cost: req.cost,
            service_provider: non_empty(req.service_provider),
            created_at: now,
            updated_at: now,
        };
        // Only ever moves forward on create.
        let last_service_date = guard
            .vehicle
            .last_service_date
            .max(Some(record.service_date));
        let event = Event::ServiceRecordSaved {
            record: record.clone(),
            last_service_date,
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!("service record {} added to vehicle {}", record.id, record.vehicle_id);
        Ok(record)
    }

    pub async fn update_service_record(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: ServicePatch,
    ) -> Result<ServiceRecord, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        let _catalog = self.catalog.lock().await;
        let mut next = self
            .service_records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(EngineError::NotFound(Entity::ServiceRecord, id))?;

        if let Some(service_type) = patch.service_type {
            policy::check_required("service_type", &service_type, MAX_NAME_LEN)?;
            next.service_type = service_type.trim().to_string();
        }
        if let Some(description) = patch.description {
            policy::check_required("description", &description, MAX_NOTES_LEN)?;
            next.description = description.trim().to_string();
        }
        if let Some(provider) = patch.service_provider {
            policy::check_optional("service_provider", Some(&provider), MAX_SHORT_TEXT_LEN)?;
            next.service_provider = non_empty(Some(provider));
        }
        if patch.cost.is_some() {
            check_cost("cost", patch.cost)?;
            next.cost = patch.cost;
        }
        next.service_date = patch.service_date.unwrap_or(next.service_date);
        next.updated_at = now_ms();

        let mut guard = self.lock_vehicle(next.vehicle_id).await?;
        // Takes the edited date only when the edited record is the newest.
        let last_service_date =
            match self.newest_record_date(next.vehicle_id, Some(&next), None) {
                Some(newest) if newest == next.service_date => Some(newest),
                _ => guard.vehicle.last_service_date,
            };
        let event = Event::ServiceRecordSaved {
            record: next.clone(),
            last_service_date,
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!("service record {id} updated");
        Ok(next)
    }

    pub async fn delete_service_record(&self, actor: &Actor, id: Ulid) -> Result<(), EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        let _catalog = self.catalog.lock().await;
        let vehicle_id = self
            .service_records
            .get(&id)
            .map(|r| r.vehicle_id)
            .ok_or(EngineError::NotFound(Entity::ServiceRecord, id))?;
        let mut guard = self.lock_vehicle(vehicle_id).await?;
        let last_service_date = self.newest_record_date(vehicle_id, None, Some(id));
        let event = Event::ServiceRecordDeleted {
            id,
            vehicle_id,
            last_service_date,
        };
        self.persist_and_apply(&mut [&mut *guard], &event).await?;
        info!("service record {id} deleted");
        Ok(())
    }

    pub fn get_service_record(&self, actor: &Actor, id: Ulid) -> Result<ServiceRecord, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        self.service_records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(EngineError::NotFound(Entity::ServiceRecord, id))
    }

    /// Newest service date first.
    pub fn list_service_records(
        &self,
        actor: &Actor,
        vehicle_id: Option<Ulid>,
    ) -> Result<Vec<ServiceRecord>, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        let mut records: Vec<ServiceRecord> = self
            .service_records
            .iter()
            .filter(|r| vehicle_id.is_none_or(|v| r.vehicle_id == v))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.service_date
                .cmp(&a.service_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(records)
    }

    // ── Damage records ───────────────────────────────────────────

    pub async fn create_damage_record(
        &self,
        actor: &Actor,
        req: NewDamageRecord,
    ) -> Result<DamageRecord, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        policy::check_required("description", &req.description, MAX_NOTES_LEN)?;
        check_cost("estimated_cost", req.estimated_cost)?;
        check_cost("actual_cost", req.actual_cost)?;
        check_photos(&req.photos)?;

        let _catalog = self.catalog.lock().await;
        if self.vehicle_state(&req.vehicle_id).is_none() {
            return Err(EngineError::NotFound(Entity::Vehicle, req.vehicle_id));
        }
        let now = now_ms();
        let record = DamageRecord {
            id: Ulid::new(),
            vehicle_id: req.vehicle_id,
            damage_date: req.damage_date,
            description: req.description.trim().to_string(),
            estimated_cost: req.estimated_cost,
            actual_cost: req.actual_cost,
            repair_status: req.repair_status.unwrap_or(RepairStatus::Pending),
            photos: req.photos,
            created_at: now,
            updated_at: now,
        };
        self.persist_and_apply(&mut [], &Event::DamageRecordSaved { record: record.clone() })
            .await?;
        info!("damage record {} added to vehicle {}", record.id, record.vehicle_id);
        Ok(record)
    }

    pub async fn update_damage_record(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: DamagePatch,
    ) -> Result<DamageRecord, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        let _catalog = self.catalog.lock().await;
        let mut next = self
            .damage_records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(EngineError::NotFound(Entity::DamageRecord, id))?;

        if let Some(description) = patch.description {
            policy::check_required("description", &description, MAX_NOTES_LEN)?;
            next.description = description.trim().to_string();
        }
        if patch.estimated_cost.is_some() {
            check_cost("estimated_cost", patch.estimated_cost)?;
            next.estimated_cost = patch.estimated_cost;
        }
        if patch.actual_cost.is_some() {
            check_cost("actual_cost", patch.actual_cost)?;
            next.actual_cost = patch.actual_cost;
        }
        if let Some(photos) = patch.photos {
            check_photos(&photos)?;
            next.photos = photos;
        }
        next.damage_date = patch.damage_date.unwrap_or(next.damage_date);
        next.repair_status = patch.repair_status.unwrap_or(next.repair_status);
        next.updated_at = now_ms();

        self.persist_and_apply(&mut [], &Event::DamageRecordSaved { record: next.clone() })
            .await?;
        info!("damage record {id} updated");
        Ok(next)
    }

    pub async fn delete_damage_record(&self, actor: &Actor, id: Ulid) -> Result<(), EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        let _catalog = self.catalog.lock().await;
        if !self.damage_records.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::DamageRecord, id));
        }
        self.persist_and_apply(&mut [], &Event::DamageRecordDeleted { id })
            .await?;
        info!("damage record {id} deleted");
        Ok(())
    }

    pub fn get_damage_record(&self, actor: &Actor, id: Ulid) -> Result<DamageRecord, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        self.damage_records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(EngineError::NotFound(Entity::DamageRecord, id))
    }

    /// Newest damage date first.
    pub fn list_damage_records(
        &self,
        actor: &Actor,
        vehicle_id: Option<Ulid>,
        repair_status: Option<RepairStatus>,
    ) -> Result<Vec<DamageRecord>, EngineError> {
        policy::require(actor, Capability::ManageRecords)?;
        let mut records: Vec<DamageRecord> = self
            .damage_records
            .iter()
            .filter(|r| vehicle_id.is_none_or(|v| r.vehicle_id == v))
            .filter(|r| repair_status.is_none_or(|s| r.repair_status == s))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.damage_date
                .cmp(&a.damage_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(records)
    }
}

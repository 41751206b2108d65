//! Wire shapes. Times are RFC 3339 UTC at this edge and milliseconds inside
//! the engine; every status carries its tag and a localized label.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::access::RouteEntry;
use crate::engine::policy::can_edit;
use crate::engine::{
    Availability, DamagePatch, NewDamageRecord, NewReservation, NewRole, NewServiceRecord, NewUser,
    NewVehicle, ReservationPatch, RolePatch, ServicePatch, UserPatch, VehiclePatch,
};
use crate::labels::{self, Locale};
use crate::model::*;

pub fn to_utc(ms: Ms) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn default_passengers() -> u32 {
    1
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReservationDto {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub user_id: Ulid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: String,
    pub destination: String,
    pub passenger_count: u32,
    pub user_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub status: ReservationStatus,
    pub status_label: &'static str,
    /// Whether the caller may still edit or cancel it.
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationDto {
    pub fn new(r: Reservation, viewer: &Actor, locale: Locale, now: Ms) -> Self {
        Self {
            can_edit: r.is_confirmed() && can_edit(&r, viewer, now),
            status_label: labels::reservation_status(r.status, locale),
            id: r.id,
            vehicle_id: r.vehicle_id,
            user_id: r.user_id,
            start_time: to_utc(r.span.start),
            end_time: to_utc(r.span.end),
            purpose: r.purpose,
            destination: r.destination,
            passenger_count: r.passenger_count,
            user_notes: r.user_notes,
            admin_notes: r.admin_notes,
            status: r.status,
            created_at: to_utc(r.created_at),
            updated_at: to_utc(r.updated_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationReq {
    pub vehicle_id: Ulid,
    pub user_id: Option<Ulid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default = "default_passengers")]
    pub passenger_count: u32,
    pub user_notes: Option<String>,
    pub admin_notes: Option<String>,
}

impl From<CreateReservationReq> for NewReservation {
    fn from(req: CreateReservationReq) -> Self {
        Self {
            vehicle_id: req.vehicle_id,
            user_id: req.user_id,
            start: req.start_time.timestamp_millis(),
            end: req.end_time.timestamp_millis(),
            purpose: req.purpose,
            destination: req.destination,
            passenger_count: req.passenger_count,
            user_notes: req.user_notes,
            admin_notes: req.admin_notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReservationReq {
    pub vehicle_id: Option<Ulid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
    pub destination: Option<String>,
    pub passenger_count: Option<u32>,
    pub user_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub status: Option<ReservationStatus>,
    pub user_id: Option<Ulid>,
}

impl From<UpdateReservationReq> for ReservationPatch {
    fn from(req: UpdateReservationReq) -> Self {
        Self {
            vehicle_id: req.vehicle_id,
            start: req.start_time.map(|t| t.timestamp_millis()),
            end: req.end_time.map(|t| t.timestamp_millis()),
            purpose: req.purpose,
            destination: req.destination,
            passenger_count: req.passenger_count,
            user_notes: req.user_notes,
            admin_notes: req.admin_notes,
            status: req.status,
            user_id: req.user_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListReservationsQuery {
    pub vehicle_id: Option<Ulid>,
    pub status: Option<ReservationStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// `start_date`/`end_date` pair used by the calendar and the reports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalDto {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<Span> for IntervalDto {
    fn from(span: Span) -> Self {
        Self {
            start_time: to_utc(span.start),
            end_time: to_utc(span.end),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictDto {
    pub reservation_id: Ulid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityDto {
    pub vehicle_id: Ulid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
    pub reservable: bool,
    pub conflicts: Vec<ConflictDto>,
    pub free: Vec<IntervalDto>,
}

impl From<Availability> for AvailabilityDto {
    fn from(a: Availability) -> Self {
        Self {
            vehicle_id: a.vehicle_id,
            start_time: to_utc(a.window.start),
            end_time: to_utc(a.window.end),
            available: a.available,
            reservable: a.reservable,
            conflicts: a
                .conflicts
                .into_iter()
                .map(|r| ConflictDto {
                    reservation_id: r.id,
                    start_time: to_utc(r.span.start),
                    end_time: to_utc(r.span.end),
                })
                .collect(),
            free: a.free.into_iter().map(IntervalDto::from).collect(),
        }
    }
}

// ── Vehicles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct VehicleDto {
    pub id: Ulid,
    pub make: String,
    pub model: String,
    pub license_plate: String,
    pub color: Option<String>,
    pub fuel_type: FuelType,
    pub seating_capacity: u32,
    pub transmission: Transmission,
    pub status: VehicleStatus,
    pub status_label: &'static str,
    pub odometer: Option<u32>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_date: Option<NaiveDate>,
    pub technical_inspection_expiry: Option<NaiveDate>,
    pub notes: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VehicleDto {
    pub fn new(v: Vehicle, locale: Locale) -> Self {
        Self {
            status_label: labels::vehicle_status(v.status, locale),
            id: v.id,
            make: v.make,
            model: v.model,
            license_plate: v.license_plate,
            color: v.color,
            fuel_type: v.fuel_type,
            seating_capacity: v.seating_capacity,
            transmission: v.transmission,
            status: v.status,
            odometer: v.odometer,
            last_service_date: v.last_service_date,
            next_service_date: v.next_service_date,
            technical_inspection_expiry: v.technical_inspection_expiry,
            notes: v.notes,
            is_archived: v.is_archived,
            created_at: to_utc(v.created_at),
            updated_at: to_utc(v.updated_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVehicleReq {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
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

impl From<CreateVehicleReq> for NewVehicle {
    fn from(req: CreateVehicleReq) -> Self {
        Self {
            make: req.make,
            model: req.model,
            license_plate: req.license_plate,
            color: req.color,
            fuel_type: req.fuel_type,
            seating_capacity: req.seating_capacity,
            transmission: req.transmission,
            status: req.status,
            odometer: req.odometer,
            last_service_date: req.last_service_date,
            next_service_date: req.next_service_date,
            technical_inspection_expiry: req.technical_inspection_expiry,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVehicleReq {
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

impl From<UpdateVehicleReq> for VehiclePatch {
    fn from(req: UpdateVehicleReq) -> Self {
        Self {
            make: req.make,
            model: req.model,
            license_plate: req.license_plate,
            color: req.color,
            fuel_type: req.fuel_type,
            seating_capacity: req.seating_capacity,
            transmission: req.transmission,
            status: req.status,
            odometer: req.odometer,
            last_service_date: req.last_service_date,
            next_service_date: req.next_service_date,
            technical_inspection_expiry: req.technical_inspection_expiry,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListVehiclesQuery {
    pub status: Option<VehicleStatus>,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    #[serde(default)]
    pub include_archived: bool,
}

// ── Users and roles ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: Ulid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub corporate_id: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub role_id: Ulid,
    pub role_name: Option<String>,
    pub role: Role,
    pub role_label: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDto {
    /// `role` is the user's role record, if it still resolves.
    pub fn new(u: User, role: Option<&RoleRecord>, locale: Locale) -> Self {
        let level = role.map_or(Role::Standard, |r| r.level);
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            corporate_id: u.corporate_id,
            department: u.department,
            phone: u.phone,
            is_active: u.is_active,
            role_id: u.role_id,
            role_name: role.map(|r| r.name.clone()),
            role: level,
            role_label: labels::role(level, locale),
            created_at: to_utc(u.created_at),
            updated_at: to_utc(u.updated_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserReq {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    pub corporate_id: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub role_id: Ulid,
}

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            username: req.username,
            email: req.email,
            full_name: req.full_name,
            corporate_id: req.corporate_id,
            department: req.department,
            phone: req.phone,
            role_id: req.role_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserReq {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub corporate_id: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<Ulid>,
    pub is_active: Option<bool>,
}

impl From<UpdateUserReq> for UserPatch {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            username: req.username,
            email: req.email,
            full_name: req.full_name,
            corporate_id: req.corporate_id,
            department: req.department,
            phone: req.phone,
            role_id: req.role_id,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListUsersQuery {
    pub active: Option<bool>,
    pub role_id: Option<Ulid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDto {
    pub id: Ulid,
    pub name: String,
    pub description: Option<String>,
    pub level: Role,
    pub level_label: &'static str,
    pub created_at: DateTime<Utc>,
}

impl RoleDto {
    pub fn new(r: RoleRecord, locale: Locale) -> Self {
        Self {
            level_label: labels::role(r.level, locale),
            id: r.id,
            name: r.name,
            description: r.description,
            level: r.level,
            created_at: to_utc(r.created_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleReq {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub level: Role,
}

impl From<CreateRoleReq> for NewRole {
    fn from(req: CreateRoleReq) -> Self {
        Self {
            name: req.name,
            description: req.description,
            level: req.level,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRoleReq {
    pub name: Option<String>,
    pub description: Option<String>,
    pub level: Option<Role>,
}

impl From<UpdateRoleReq> for RolePatch {
    fn from(req: UpdateRoleReq) -> Self {
        Self {
            name: req.name,
            description: req.description,
            level: req.level,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavEntryDto {
    pub path: &'static str,
    pub key: &'static str,
}

impl From<RouteEntry> for NavEntryDto {
    fn from(r: RouteEntry) -> Self {
        Self {
            path: r.path,
            key: r.key,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationDto {
    pub landing_route: &'static str,
    pub routes: Vec<NavEntryDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeDto {
    pub user: UserDto,
    pub navigation: NavigationDto,
}

// ── Records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecordDto {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub service_date: NaiveDate,
    pub service_type: String,
    pub description: String,
    pub cost: Option<f64>,
    pub service_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServiceRecord> for ServiceRecordDto {
    fn from(r: ServiceRecord) -> Self {
        Self {
            id: r.id,
            vehicle_id: r.vehicle_id,
            service_date: r.service_date,
            service_type: r.service_type,
            description: r.description,
            cost: r.cost,
            service_provider: r.service_provider,
            created_at: to_utc(r.created_at),
            updated_at: to_utc(r.updated_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRecordReq {
    pub vehicle_id: Ulid,
    pub service_date: NaiveDate,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub description: String,
    pub cost: Option<f64>,
    pub service_provider: Option<String>,
}

impl From<CreateServiceRecordReq> for NewServiceRecord {
    fn from(req: CreateServiceRecordReq) -> Self {
        Self {
            vehicle_id: req.vehicle_id,
            service_date: req.service_date,
            service_type: req.service_type,
            description: req.description,
            cost: req.cost,
            service_provider: req.service_provider,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceRecordReq {
    pub service_date: Option<NaiveDate>,
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub service_provider: Option<String>,
}

impl From<UpdateServiceRecordReq> for ServicePatch {
    fn from(req: UpdateServiceRecordReq) -> Self {
        Self {
            service_date: req.service_date,
            service_type: req.service_type,
            description: req.description,
            cost: req.cost,
            service_provider: req.service_provider,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DamageRecordDto {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub damage_date: NaiveDate,
    pub description: String,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub repair_status: RepairStatus,
    pub repair_status_label: &'static str,
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DamageRecordDto {
    pub fn new(r: DamageRecord, locale: Locale) -> Self {
        Self {
            repair_status_label: labels::repair_status(r.repair_status, locale),
            id: r.id,
            vehicle_id: r.vehicle_id,
            damage_date: r.damage_date,
            description: r.description,
            estimated_cost: r.estimated_cost,
            actual_cost: r.actual_cost,
            repair_status: r.repair_status,
            photos: r.photos,
            created_at: to_utc(r.created_at),
            updated_at: to_utc(r.updated_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDamageRecordReq {
    pub vehicle_id: Ulid,
    pub damage_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub repair_status: Option<RepairStatus>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl From<CreateDamageRecordReq> for NewDamageRecord {
    fn from(req: CreateDamageRecordReq) -> Self {
        Self {
            vehicle_id: req.vehicle_id,
            damage_date: req.damage_date,
            description: req.description,
            estimated_cost: req.estimated_cost,
            actual_cost: req.actual_cost,
            repair_status: req.repair_status,
            photos: req.photos,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDamageRecordReq {
    pub damage_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub repair_status: Option<RepairStatus>,
    pub photos: Option<Vec<String>>,
}

impl From<UpdateDamageRecordReq> for DamagePatch {
    fn from(req: UpdateDamageRecordReq) -> Self {
        Self {
            damage_date: req.damage_date,
            description: req.description,
            estimated_cost: req.estimated_cost,
            actual_cost: req.actual_cost,
            repair_status: req.repair_status,
            photos: req.photos,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRecordsQuery {
    pub vehicle_id: Option<Ulid>,
    pub repair_status: Option<RepairStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    #[test]
    fn reservation_dto_labels_and_edit_flag() {
        let owner = Actor { id: Ulid::new(), role: Role::Standard };
        let start = 1_800_000_000_000;
        let r = fixtures::reservation(Ulid::new(), owner.id, start, start + HOUR_MS);

        let early = ReservationDto::new(r.clone(), &owner, Locale::En, start - 3 * HOUR_MS);
        assert!(early.can_edit);
        assert_eq!(early.status_label, "Confirmed");
        assert_eq!(early.start_time.timestamp_millis(), start);

        let late = ReservationDto::new(r, &owner, Locale::Cs, start - HOUR_MS);
        assert!(!late.can_edit);
        assert_eq!(late.status_label, "Potvrzená");
    }

    #[test]
    fn status_serializes_as_tag() {
        let v = VehicleDto::new(fixtures::vehicle(5), Locale::En);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["status_label"], "Active");
        assert_eq!(json["fuel_type"], "diesel");
    }

    #[test]
    fn create_request_defaults() {
        let req: CreateReservationReq = serde_json::from_str(&format!(
            r#"{{"vehicle_id":"{}","start_time":"2030-01-01T10:00:00Z","end_time":"2030-01-01T12:00:00Z"}}"#,
            Ulid::new()
        ))
        .unwrap();
        assert_eq!(req.passenger_count, 1);
        assert!(req.purpose.is_empty());
        let new: NewReservation = req.into();
        assert_eq!(new.end - new.start, 2 * HOUR_MS);
    }
}

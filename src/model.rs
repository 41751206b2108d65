use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type inside the engine.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ── Tagged enums ─────────────────────────────────────────────────
//
// Tags are the stable machine-readable form (serde + query strings).
// Display text lives in `crate::labels`.

/// Permission level carried by a role. Policy only ever looks at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn tag(self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }

    /// Confirmed is the only state with outgoing transitions.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Confirmed, ReservationStatus::Cancelled)
                | (ReservationStatus::Confirmed, ReservationStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Active,
    InMaintenance,
    OutOfService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Petrol,
    Diesel,
    Electric,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Pending,
    Repaired,
    Irreparable,
}

// ── Entities ─────────────────────────────────────────────────────

/// The identity every policy decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Ulid,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub user_id: Ulid,
    pub span: Span,
    pub purpose: String,
    pub destination: String,
    pub passenger_count: u32,
    pub user_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Reservation {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Ulid,
    pub make: String,
    pub model: String,
    pub license_plate: String,
    pub color: Option<String>,
    pub fuel_type: FuelType,
    pub seating_capacity: u32,
    pub transmission: Transmission,
    pub status: VehicleStatus,
    pub odometer: Option<u32>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_date: Option<NaiveDate>,
    pub technical_inspection_expiry: Option<NaiveDate>,
    pub notes: Option<String>,
    pub is_archived: bool,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Vehicle {
    /// Only active, non-archived vehicles accept new reservations.
    pub fn is_reservable(&self) -> bool {
        self.status == VehicleStatus::Active && !self.is_archived
    }

    /// "Make Model (PLATE)", the form used in listings and reports.
    pub fn display_name(&self) -> String {
        format!("{} {} ({})", self.make, self.model, self.license_plate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub corporate_id: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub role_id: Ulid,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// Named permission bucket. `level` is what policy reads; `name` is display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: Ulid,
    pub name: String,
    pub description: Option<String>,
    pub level: Role,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub service_date: NaiveDate,
    pub service_type: String,
    pub description: String,
    pub cost: Option<f64>,
    pub service_provider: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRecord {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub damage_date: NaiveDate,
    pub description: String,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub repair_status: RepairStatus,
    pub photos: Vec<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

// ── Per-vehicle state ────────────────────────────────────────────

/// A vehicle plus every reservation ever made on it, guarded as one unit so
/// that conflict check and commit happen under the same lock.
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub vehicle: Vehicle,
    /// Sorted by `span.start`. Includes cancelled and completed reservations.
    pub reservations: Vec<Reservation>,
}

impl VehicleState {
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            vehicle,
            reservations: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.span.start <= reservation.span.start);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    /// Replace an existing reservation, re-sorting if its start moved.
    pub fn replace_reservation(&mut self, reservation: Reservation) {
        self.remove_reservation(reservation.id);
        self.insert_reservation(reservation);
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    /// Reservations whose span overlaps the query window, any status.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

/// Log record. Flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    VehicleCreated {
        vehicle: Vehicle,
    },
    VehicleUpdated {
        vehicle: Vehicle,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationUpdated {
        reservation: Reservation,
    },
    /// Edit that changed the vehicle; `reservation.vehicle_id` is the new one.
    ReservationMoved {
        reservation: Reservation,
        from_vehicle_id: Ulid,
    },
    ReservationCancelled {
        id: Ulid,
        vehicle_id: Ulid,
        at: Ms,
    },
    RoleCreated {
        role: RoleRecord,
    },
    RoleUpdated {
        role: RoleRecord,
    },
    RoleDeleted {
        id: Ulid,
    },
    UserCreated {
        user: User,
    },
    UserUpdated {
        user: User,
    },
    /// Carries the vehicle's recomputed last service date so both land atomically.
    ServiceRecordSaved {
        record: ServiceRecord,
        last_service_date: Option<NaiveDate>,
    },
    ServiceRecordDeleted {
        id: Ulid,
        vehicle_id: Ulid,
        last_service_date: Option<NaiveDate>,
    },
    DamageRecordSaved {
        record: DamageRecord,
    },
    DamageRecordDeleted {
        id: Ulid,
    },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn vehicle(seats: u32) -> Vehicle {
        Vehicle {
            id: Ulid::new(),
            make: "Skoda".into(),
            model: "Octavia".into(),
            license_plate: format!("1A{}", &Ulid::new().to_string()[20..]),
            color: None,
            fuel_type: FuelType::Diesel,
            seating_capacity: seats,
            transmission: Transmission::Manual,
            status: VehicleStatus::Active,
            odometer: None,
            last_service_date: None,
            next_service_date: None,
            technical_inspection_expiry: None,
            notes: None,
            is_archived: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn reservation(vehicle_id: Ulid, user_id: Ulid, start: Ms, end: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            vehicle_id,
            user_id,
            span: Span::new(start, end),
            purpose: "Client visit".into(),
            destination: "Brno".into(),
            passenger_count: 1,
            user_notes: None,
            admin_notes: None,
            status: ReservationStatus::Confirmed,
            created_at: 0,
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn span_half_open() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.contains_instant(100));
        assert!(!s.contains_instant(200));
        assert!(!s.overlaps(&Span::new(200, 300)));
        assert!(s.overlaps(&Span::new(199, 300)));
        assert!(s.contains_span(&Span::new(120, 200)));
    }

    #[test]
    fn only_confirmed_has_transitions() {
        use ReservationStatus::*;
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn reservability() {
        let mut v = vehicle(5);
        assert!(v.is_reservable());
        v.status = VehicleStatus::InMaintenance;
        assert!(!v.is_reservable());
        v.status = VehicleStatus::Active;
        v.is_archived = true;
        assert!(!v.is_reservable());
    }

    #[test]
    fn reservations_stay_sorted() {
        let v = vehicle(5);
        let user = Ulid::new();
        let mut vs = VehicleState::new(v.clone());
        vs.insert_reservation(reservation(v.id, user, 300, 400));
        vs.insert_reservation(reservation(v.id, user, 100, 200));
        vs.insert_reservation(reservation(v.id, user, 200, 300));
        let starts: Vec<Ms> = vs.reservations.iter().map(|r| r.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn replace_resorts_moved_reservation() {
        let v = vehicle(5);
        let user = Ulid::new();
        let mut vs = VehicleState::new(v.clone());
        let mut early = reservation(v.id, user, 100, 200);
        vs.insert_reservation(early.clone());
        vs.insert_reservation(reservation(v.id, user, 300, 400));

        early.span = Span::new(500, 600);
        vs.replace_reservation(early.clone());
        assert_eq!(vs.reservations.len(), 2);
        assert_eq!(vs.reservations[1].id, early.id);
    }

    #[test]
    fn overlapping_respects_half_open_bounds() {
        let v = vehicle(5);
        let user = Ulid::new();
        let mut vs = VehicleState::new(v.clone());
        vs.insert_reservation(reservation(v.id, user, 100, 200));
        vs.insert_reservation(reservation(v.id, user, 450, 600));
        vs.insert_reservation(reservation(v.id, user, 1000, 1100));

        let hits: Vec<_> = vs.overlapping(&Span::new(200, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));

        assert_eq!(vs.overlapping(&Span::new(1100, 2000)).count(), 0);
    }

    #[test]
    fn remove_missing_reservation_is_none() {
        let v = vehicle(5);
        let mut vs = VehicleState::new(v.clone());
        vs.insert_reservation(reservation(v.id, Ulid::new(), 100, 200));
        assert!(vs.remove_reservation(Ulid::new()).is_none());
        assert_eq!(vs.reservations.len(), 1);
    }

    #[test]
    fn event_survives_bincode() {
        let v = vehicle(4);
        let event = Event::ReservationCreated {
            reservation: reservation(v.id, Ulid::new(), 1_000, 2_000),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}

//! Read-only fleet reports computed over an engine [`Snapshot`].
//!
//! Everything here is a pure function of the snapshot and the clock, so the
//! HTTP layer takes one snapshot per request and never holds engine locks
//! while aggregating.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::engine::{EngineError, Rule, Snapshot};
use crate::labels::{self, Locale};
use crate::model::*;

const TREND_MONTHS: i32 = 6;
const RECENT_DAYS: i64 = 30;
const TOP_N: usize = 10;

/// Inclusive calendar-day range, evaluated as `[from 00:00, to+1 00:00)` UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, EngineError> {
        if to < from {
            return Err(Rule::EndNotAfterStart.into());
        }
        Ok(Self { from, to })
    }

    pub fn span(&self) -> Span {
        Span::new(midnight_ms(self.from), midnight_ms(self.to) + DAY_MS)
    }

    fn contains_date(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

pub fn midnight_ms(date: NaiveDate) -> Ms {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn date_of(ms: Ms) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|t| t.date_naive())
}

/// Months since year 0, so month arithmetic is plain integer math.
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Dashboard ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_active_vehicles: u32,
    pub total_active_users: u32,
    pub monthly_reservations: u32,
    pub active_reservations: u32,
    pub vehicles_in_maintenance: u32,
    pub recent_services: u32,
    pub unresolved_damages: u32,
    /// Oldest month first, ending with the current one.
    pub reservation_trend: Vec<MonthCount>,
}

fn count<T>(items: impl Iterator<Item = T>) -> u32 {
    items.count() as u32
}

pub fn dashboard(snap: &Snapshot, now: DateTime<Utc>) -> Dashboard {
    let now_ms = now.timestamp_millis();
    let this_month = month_index(now.date_naive());
    let created_months: Vec<i32> = snap
        .reservations
        .iter()
        .filter_map(|r| date_of(r.created_at))
        .map(month_index)
        .collect();

    let reservation_trend = (0..TREND_MONTHS)
        .rev()
        .map(|back| {
            let idx = this_month - back;
            MonthCount {
                month: format!("{:04}-{:02}", idx.div_euclid(12), idx.rem_euclid(12) + 1),
                count: count(created_months.iter().filter(|&&m| m == idx)),
            }
        })
        .collect();

    Dashboard {
        total_active_vehicles: count(snap.vehicles.iter().filter(|v| !v.is_archived)),
        total_active_users: count(snap.users.iter().filter(|u| u.is_active)),
        monthly_reservations: count(created_months.iter().filter(|&&m| m == this_month)),
        active_reservations: count(
            snap.reservations
                .iter()
                .filter(|r| r.is_confirmed() && r.span.contains_instant(now_ms)),
        ),
        vehicles_in_maintenance: count(
            snap.vehicles
                .iter()
                .filter(|v| v.status == VehicleStatus::InMaintenance),
        ),
        recent_services: count(
            snap.service_records
                .iter()
                .filter(|s| s.created_at >= now_ms - RECENT_DAYS * DAY_MS),
        ),
        unresolved_damages: count(
            snap.damage_records
                .iter()
                .filter(|d| d.repair_status == RepairStatus::Pending),
        ),
        reservation_trend,
    }
}

// ── Vehicle utilization ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleUtilization {
    pub vehicle_id: Ulid,
    pub vehicle_info: String,
    pub total_reserved_hours: f64,
    pub utilization_percentage: f64,
    pub reservation_count: u32,
}

/// Confirmed reservations lying wholly inside the range, per non-archived
/// vehicle. Highest utilization first.
pub fn vehicle_utilization(snap: &Snapshot, range: DateRange) -> Vec<VehicleUtilization> {
    let window = range.span();
    let period_hours = window.duration_ms() as f64 / HOUR_MS as f64;

    let mut per_vehicle: HashMap<Ulid, (Ms, u32)> = HashMap::new();
    for r in snap
        .reservations
        .iter()
        .filter(|r| r.is_confirmed() && window.contains_span(&r.span))
    {
        let entry = per_vehicle.entry(r.vehicle_id).or_default();
        entry.0 += r.span.duration_ms();
        entry.1 += 1;
    }

    let mut rows: Vec<VehicleUtilization> = snap
        .vehicles
        .iter()
        .filter(|v| !v.is_archived)
        .map(|v| {
            let (reserved_ms, reservation_count) = per_vehicle.get(&v.id).copied().unwrap_or_default();
            let hours = reserved_ms as f64 / HOUR_MS as f64;
            VehicleUtilization {
                vehicle_id: v.id,
                vehicle_info: v.display_name(),
                total_reserved_hours: round2(hours),
                utilization_percentage: round2(hours / period_hours * 100.0),
                reservation_count,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.utilization_percentage
            .total_cmp(&a.utilization_percentage)
            .then_with(|| a.vehicle_info.cmp(&b.vehicle_info))
    });
    rows
}

// ── Cost analysis ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleCost {
    pub vehicle_id: Ulid,
    pub vehicle_info: String,
    pub service_costs: f64,
    pub damage_costs: f64,
    pub total_costs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSummary {
    pub total_service_costs: f64,
    pub total_damage_costs: f64,
    pub grand_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostAnalysis {
    pub vehicles: Vec<VehicleCost>,
    pub summary: CostSummary,
}

/// Service costs by service date plus actual damage costs by damage date.
pub fn cost_analysis(snap: &Snapshot, range: DateRange) -> CostAnalysis {
    let mut service: HashMap<Ulid, f64> = HashMap::new();
    for s in snap
        .service_records
        .iter()
        .filter(|s| range.contains_date(s.service_date))
    {
        *service.entry(s.vehicle_id).or_default() += s.cost.unwrap_or(0.0);
    }
    let mut damage: HashMap<Ulid, f64> = HashMap::new();
    for d in snap
        .damage_records
        .iter()
        .filter(|d| range.contains_date(d.damage_date))
    {
        *damage.entry(d.vehicle_id).or_default() += d.actual_cost.unwrap_or(0.0);
    }

    let mut vehicles: Vec<VehicleCost> = snap
        .vehicles
        .iter()
        .filter(|v| !v.is_archived)
        .map(|v| {
            let service_costs = service.get(&v.id).copied().unwrap_or(0.0);
            let damage_costs = damage.get(&v.id).copied().unwrap_or(0.0);
            VehicleCost {
                vehicle_id: v.id,
                vehicle_info: v.display_name(),
                service_costs,
                damage_costs,
                total_costs: service_costs + damage_costs,
            }
        })
        .collect();
    vehicles.sort_by(|a, b| {
        b.total_costs
            .total_cmp(&a.total_costs)
            .then_with(|| a.vehicle_info.cmp(&b.vehicle_info))
    });

    let total_service_costs: f64 = vehicles.iter().map(|v| v.service_costs).sum();
    let total_damage_costs: f64 = vehicles.iter().map(|v| v.damage_costs).sum();
    CostAnalysis {
        vehicles,
        summary: CostSummary {
            total_service_costs,
            total_damage_costs,
            grand_total: total_service_costs + total_damage_costs,
        },
    }
}

// ── Reservation statistics ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: ReservationStatus,
    pub status_label: &'static str,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCount {
    pub user_id: Ulid,
    pub user_name: String,
    pub reservation_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleCount {
    pub vehicle_id: Ulid,
    pub vehicle_info: String,
    pub reservation_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationStatistics {
    pub status_breakdown: Vec<StatusCount>,
    pub top_users: Vec<UserCount>,
    pub top_vehicles: Vec<VehicleCount>,
    pub daily_overview: Vec<DayCount>,
}

fn top_counts(ids: impl Iterator<Item = Ulid>) -> Vec<(Ulid, u32)> {
    let mut counts: HashMap<Ulid, u32> = HashMap::new();
    for id in ids {
        *counts.entry(id).or_default() += 1;
    }
    let mut ranked: Vec<(Ulid, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(TOP_N);
    ranked
}

/// Breakdowns over reservations created inside `range`, or over all of them
/// when no range is given. The daily overview falls back to the last 30 days.
pub fn reservation_statistics(
    snap: &Snapshot,
    range: Option<DateRange>,
    now: DateTime<Utc>,
    locale: Locale,
) -> ReservationStatistics {
    let created_window = range.map(|r| r.span());
    let in_scope: Vec<&Reservation> = snap
        .reservations
        .iter()
        .filter(|r| created_window.is_none_or(|w| w.contains_instant(r.created_at)))
        .collect();

    let status_breakdown = [
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Completed,
    ]
    .into_iter()
    .map(|status| StatusCount {
        status,
        status_label: labels::reservation_status(status, locale),
        count: count(in_scope.iter().filter(|r| r.status == status)),
    })
    .filter(|s| s.count > 0)
    .collect();

    let names: HashMap<Ulid, &str> = snap
        .users
        .iter()
        .map(|u| (u.id, u.full_name.as_str()))
        .collect();
    let top_users = top_counts(in_scope.iter().map(|r| r.user_id))
        .into_iter()
        .map(|(user_id, reservation_count)| UserCount {
            user_id,
            user_name: names.get(&user_id).map(|n| n.to_string()).unwrap_or_default(),
            reservation_count,
        })
        .collect();

    let infos: HashMap<Ulid, String> = snap
        .vehicles
        .iter()
        .map(|v| (v.id, v.display_name()))
        .collect();
    let top_vehicles = top_counts(in_scope.iter().map(|r| r.vehicle_id))
        .into_iter()
        .map(|(vehicle_id, reservation_count)| VehicleCount {
            vehicle_id,
            vehicle_info: infos.get(&vehicle_id).cloned().unwrap_or_default(),
            reservation_count,
        })
        .collect();

    let now_ms = now.timestamp_millis();
    let daily_window = created_window.unwrap_or(Span::new(now_ms - RECENT_DAYS * DAY_MS, now_ms));
    let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for r in snap
        .reservations
        .iter()
        .filter(|r| daily_window.contains_instant(r.created_at))
    {
        if let Some(date) = date_of(r.created_at) {
            *days.entry(date).or_default() += 1;
        }
    }

    ReservationStatistics {
        status_breakdown,
        top_users,
        top_vehicles,
        daily_overview: days
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect(),
    }
}

// ── CSV export ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    VehicleUtilization,
    CostAnalysis,
    ReservationStatistics,
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vehicle-utilization" => Ok(ReportKind::VehicleUtilization),
            "cost-analysis" => Ok(ReportKind::CostAnalysis),
            "reservation-statistics" => Ok(ReportKind::ReservationStatistics),
            other => Err(format!("unknown report: {other}")),
        }
    }
}

impl ReportKind {
    pub fn filename(self) -> &'static str {
        match self {
            ReportKind::VehicleUtilization => "vehicle_utilization.csv",
            ReportKind::CostAnalysis => "cost_analysis.csv",
            ReportKind::ReservationStatistics => "reservation_statistics.csv",
        }
    }
}

#[derive(Default)]
struct CsvWriter {
    out: String,
}

impl CsvWriter {
    fn row<S: AsRef<str>>(&mut self, fields: &[S]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            let field = field.as_ref();
            if field.contains([',', '"', '\n', '\r']) {
                self.out.push('"');
                self.out.push_str(&field.replace('"', "\"\""));
                self.out.push('"');
            } else {
                self.out.push_str(field);
            }
        }
        self.out.push_str("\r\n");
    }
}

/// Render a report as CSV. Utilization and cost analysis need a range.
pub fn export_csv(
    snap: &Snapshot,
    kind: ReportKind,
    range: Option<DateRange>,
    now: DateTime<Utc>,
    locale: Locale,
) -> Result<String, EngineError> {
    let mut csv = CsvWriter::default();
    match kind {
        ReportKind::VehicleUtilization => {
            let range = range.ok_or(Rule::Required("start_date"))?;
            csv.row(&["Vehicle", "Reserved Hours", "Utilization %", "Reservations"]);
            for row in vehicle_utilization(snap, range) {
                csv.row(&[
                    row.vehicle_info,
                    row.total_reserved_hours.to_string(),
                    row.utilization_percentage.to_string(),
                    row.reservation_count.to_string(),
                ]);
            }
        }
        ReportKind::CostAnalysis => {
            let range = range.ok_or(Rule::Required("start_date"))?;
            let report = cost_analysis(snap, range);
            csv.row(&["Vehicle", "Service Costs", "Damage Costs", "Total Costs"]);
            for row in report.vehicles {
                csv.row(&[
                    row.vehicle_info,
                    row.service_costs.to_string(),
                    row.damage_costs.to_string(),
                    row.total_costs.to_string(),
                ]);
            }
            csv.row(&[
                "TOTAL".to_string(),
                report.summary.total_service_costs.to_string(),
                report.summary.total_damage_costs.to_string(),
                report.summary.grand_total.to_string(),
            ]);
        }
        ReportKind::ReservationStatistics => {
            let stats = reservation_statistics(snap, range, now, locale);
            csv.row(&["Status Breakdown"]);
            csv.row(&["Status", "Count"]);
            for s in stats.status_breakdown {
                csv.row(&[s.status_label.to_string(), s.count.to_string()]);
            }
            csv.row::<&str>(&[]);
            csv.row(&["Top Users"]);
            csv.row(&["User Name", "Reservation Count"]);
            for u in stats.top_users {
                csv.row(&[u.user_name, u.reservation_count.to_string()]);
            }
            csv.row::<&str>(&[]);
            csv.row(&["Top Vehicles"]);
            csv.row(&["Vehicle", "Reservation Count"]);
            for v in stats.top_vehicles {
                csv.row(&[v.vehicle_info, v.reservation_count.to_string()]);
            }
        }
    }
    Ok(csv.out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn ms(t: DateTime<Utc>) -> Ms {
        t.timestamp_millis()
    }

    fn user(name: &str) -> User {
        User {
            id: Ulid::new(),
            username: name.to_lowercase(),
            email: format!("{}@example.com", name.to_lowercase()),
            full_name: name.into(),
            corporate_id: None,
            department: None,
            phone: None,
            is_active: true,
            role_id: Ulid::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn booked(v: &Vehicle, u: &User, start: DateTime<Utc>, hours: i64, created: DateTime<Utc>) -> Reservation {
        let mut r = fixtures::reservation(v.id, u.id, ms(start), ms(start) + hours * HOUR_MS);
        r.created_at = ms(created);
        r
    }

    fn snapshot() -> (Snapshot, Vehicle, Vehicle, User, User) {
        let busy = fixtures::vehicle(5);
        let idle = fixtures::vehicle(7);
        let mut archived = fixtures::vehicle(5);
        archived.is_archived = true;
        let jana = user("Jana");
        let petr = user("Petr");

        let mut cancelled = booked(&busy, &petr, at(2025, 3, 4, 8), 2, at(2025, 2, 20, 9));
        cancelled.status = ReservationStatus::Cancelled;
        let snap = Snapshot {
            vehicles: vec![busy.clone(), idle.clone(), archived],
            reservations: vec![
                booked(&busy, &jana, at(2025, 3, 2, 8), 12, at(2025, 2, 10, 9)),
                booked(&busy, &jana, at(2025, 3, 3, 8), 12, at(2025, 3, 1, 9)),
                cancelled,
                // crosses the range end, not counted for utilization
                booked(&idle, &petr, at(2025, 3, 10, 20), 8, at(2025, 3, 1, 10)),
            ],
            users: vec![jana.clone(), petr.clone()],
            ..Snapshot::default()
        };
        (snap, busy, idle, jana, petr)
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        assert!(DateRange::new(date(2025, 3, 2), date(2025, 3, 1)).is_err());
        let one_day = DateRange::new(date(2025, 3, 1), date(2025, 3, 1)).unwrap();
        assert_eq!(one_day.span().duration_ms(), DAY_MS);
    }

    #[test]
    fn utilization_counts_confirmed_inside_range() {
        let (snap, busy, idle, _, _) = snapshot();
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 10)).unwrap();
        let rows = vehicle_utilization(&snap, range);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vehicle_id, busy.id);
        assert_eq!(rows[0].total_reserved_hours, 24.0);
        assert_eq!(rows[0].reservation_count, 2);
        assert_eq!(rows[0].utilization_percentage, 10.0);
        assert_eq!(rows[1].vehicle_id, idle.id);
        assert_eq!(rows[1].reservation_count, 0);
    }

    #[test]
    fn cost_analysis_sums_by_date() {
        let (mut snap, busy, idle, _, _) = snapshot();
        let service = |vehicle_id, on, cost| ServiceRecord {
            id: Ulid::new(),
            vehicle_id,
            service_date: on,
            service_type: "Oil".into(),
            description: "Oil change".into(),
            cost,
            service_provider: None,
            created_at: 0,
            updated_at: 0,
        };
        snap.service_records = vec![
            service(busy.id, date(2025, 3, 5), Some(1_000.0)),
            service(busy.id, date(2025, 4, 5), Some(9_999.0)),
            service(idle.id, date(2025, 3, 6), None),
        ];
        snap.damage_records = vec![DamageRecord {
            id: Ulid::new(),
            vehicle_id: idle.id,
            damage_date: date(2025, 3, 31),
            description: "Mirror".into(),
            estimated_cost: Some(3_000.0),
            actual_cost: Some(2_500.0),
            repair_status: RepairStatus::Repaired,
            photos: vec![],
            created_at: 0,
            updated_at: 0,
        }];

        let report = cost_analysis(&snap, DateRange::new(date(2025, 3, 1), date(2025, 3, 31)).unwrap());
        assert_eq!(report.vehicles[0].vehicle_id, idle.id);
        assert_eq!(report.vehicles[0].total_costs, 2_500.0);
        assert_eq!(report.vehicles[1].service_costs, 1_000.0);
        assert_eq!(report.summary.grand_total, 3_500.0);
    }

    #[test]
    fn dashboard_counts_and_trend() {
        let (mut snap, busy, _, _, petr) = snapshot();
        snap.users[1].is_active = false;
        snap.vehicles[1].status = VehicleStatus::InMaintenance;
        snap.damage_records = vec![DamageRecord {
            id: Ulid::new(),
            vehicle_id: busy.id,
            damage_date: date(2025, 3, 1),
            description: "Dent".into(),
            estimated_cost: None,
            actual_cost: None,
            repair_status: RepairStatus::Pending,
            photos: vec![],
            created_at: 0,
            updated_at: 0,
        }];
        // ongoing right now
        snap.reservations
            .push(booked(&busy, &petr, at(2025, 3, 15, 8), 4, at(2025, 3, 14, 8)));

        let d = dashboard(&snap, at(2025, 3, 15, 10));
        assert_eq!(d.total_active_vehicles, 2);
        assert_eq!(d.total_active_users, 1);
        assert_eq!(d.monthly_reservations, 3);
        assert_eq!(d.active_reservations, 1);
        assert_eq!(d.vehicles_in_maintenance, 1);
        assert_eq!(d.unresolved_damages, 1);

        let months: Vec<&str> = d.reservation_trend.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, ["2024-10", "2024-11", "2024-12", "2025-01", "2025-02", "2025-03"]);
        assert_eq!(d.reservation_trend[4].count, 2);
        assert_eq!(d.reservation_trend[5].count, 3);
    }

    #[test]
    fn statistics_rank_users_and_vehicles() {
        let (snap, busy, _, jana, _) = snapshot();
        let stats = reservation_statistics(&snap, None, at(2025, 3, 15, 0), Locale::En);

        assert_eq!(stats.status_breakdown.len(), 2);
        assert_eq!(stats.status_breakdown[0].status_label, "Confirmed");
        assert_eq!(stats.status_breakdown[0].count, 3);
        assert_eq!(stats.top_users.len(), 2);
        assert!(stats.top_users.iter().all(|u| u.reservation_count == 2));
        let top_jana = stats.top_users.iter().find(|u| u.user_id == jana.id).unwrap();
        assert_eq!(top_jana.user_name, "Jana");
        assert_eq!(stats.top_vehicles[0].vehicle_id, busy.id);
        assert_eq!(stats.top_vehicles[0].reservation_count, 3);

        // last 30 days: Feb 13 .. Mar 15
        let days: Vec<NaiveDate> = stats.daily_overview.iter().map(|d| d.date).collect();
        assert_eq!(days, [date(2025, 2, 20), date(2025, 3, 1)]);
        assert_eq!(stats.daily_overview[1].count, 2);
    }

    #[test]
    fn statistics_scope_to_created_range() {
        let (snap, _, _, _, petr) = snapshot();
        let march = DateRange::new(date(2025, 3, 1), date(2025, 3, 31)).unwrap();
        let stats = reservation_statistics(&snap, Some(march), at(2025, 4, 1, 0), Locale::Cs);
        let total: u32 = stats.status_breakdown.iter().map(|s| s.count).sum();
        assert_eq!(total, 2);
        assert_eq!(stats.status_breakdown[0].status_label, "Potvrzená");
        assert!(stats.top_users.iter().any(|u| u.user_id == petr.id));
    }

    #[test]
    fn csv_export_quotes_and_requires_range() {
        let (mut snap, _, _, _, _) = snapshot();
        snap.vehicles[0].make = "Skoda, a.s.".into();
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 10)).unwrap();

        let csv = export_csv(&snap, ReportKind::VehicleUtilization, Some(range), at(2025, 3, 15, 0), Locale::En)
            .unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Vehicle,Reserved Hours,Utilization %,Reservations"));
        assert!(lines.next().unwrap().starts_with("\"Skoda, a.s. Octavia"));

        let costs = export_csv(&snap, ReportKind::CostAnalysis, Some(range), at(2025, 3, 15, 0), Locale::En)
            .unwrap();
        assert!(costs.trim_end().ends_with("TOTAL,0,0,0"));

        assert!(matches!(
            export_csv(&snap, ReportKind::CostAnalysis, None, at(2025, 3, 15, 0), Locale::En),
            Err(EngineError::Validation(Rule::Required("start_date")))
        ));
        assert!(export_csv(&snap, ReportKind::ReservationStatistics, None, at(2025, 3, 15, 0), Locale::En).is_ok());
        assert!("fuel-usage".parse::<ReportKind>().is_err());
    }
}

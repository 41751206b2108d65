//! Display text for status tags. Policy code never reads these strings.

use std::str::FromStr;

use crate::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Cs,
    En,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cs" | "cs-cz" | "cz" => Ok(Locale::Cs),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

pub fn reservation_status(status: ReservationStatus, locale: Locale) -> &'static str {
    use ReservationStatus::*;
    match (locale, status) {
        (Locale::Cs, Confirmed) => "Potvrzená",
        (Locale::Cs, Cancelled) => "Zrušená",
        (Locale::Cs, Completed) => "Dokončená",
        (Locale::En, Confirmed) => "Confirmed",
        (Locale::En, Cancelled) => "Cancelled",
        (Locale::En, Completed) => "Completed",
    }
}

pub fn vehicle_status(status: VehicleStatus, locale: Locale) -> &'static str {
    use VehicleStatus::*;
    match (locale, status) {
        (Locale::Cs, Active) => "Aktivní",
        (Locale::Cs, InMaintenance) => "V údržbě",
        (Locale::Cs, OutOfService) => "Mimo provoz",
        (Locale::En, Active) => "Active",
        (Locale::En, InMaintenance) => "In maintenance",
        (Locale::En, OutOfService) => "Out of service",
    }
}

pub fn repair_status(status: RepairStatus, locale: Locale) -> &'static str {
    use RepairStatus::*;
    match (locale, status) {
        (Locale::Cs, Pending) => "Čeká na opravu",
        (Locale::Cs, Repaired) => "Opraveno",
        (Locale::Cs, Irreparable) => "Neopravitelné",
        (Locale::En, Pending) => "Awaiting repair",
        (Locale::En, Repaired) => "Repaired",
        (Locale::En, Irreparable) => "Irreparable",
    }
}

pub fn role(role: Role, locale: Locale) -> &'static str {
    match (locale, role) {
        (Locale::Cs, Role::Administrator) => "Administrátor",
        (Locale::Cs, Role::Standard) => "Zaměstnanec",
        (Locale::En, Role::Administrator) => "Administrator",
        (Locale::En, Role::Standard) => "Employee",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_parsing() {
        assert_eq!("cs".parse::<Locale>(), Ok(Locale::Cs));
        assert_eq!("EN-us".parse::<Locale>(), Ok(Locale::En));
        assert!("de".parse::<Locale>().is_err());
    }

    #[test]
    fn labels_are_decoupled_from_tags() {
        let status = ReservationStatus::Cancelled;
        assert_eq!(status.tag(), "cancelled");
        assert_eq!(reservation_status(status, Locale::Cs), "Zrušená");
        assert_eq!(reservation_status(status, Locale::En), "Cancelled");
    }
}

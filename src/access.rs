//! Capability checks and route visibility.
//!
//! Every role-dependent branch in the service goes through [`Role::can`].

use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create, edit, archive vehicles.
    ManageFleet,
    /// Create and edit users and roles.
    ManageUsers,
    /// Service and damage records.
    ManageRecords,
    ViewReports,
    /// Edit or cancel any reservation regardless of owner or edit window,
    /// and touch admin-only reservation fields.
    OverrideReservations,
    ViewAllReservations,
    /// Create a reservation on behalf of another user.
    BookForOthers,
}

impl Role {
    pub fn can(self, capability: Capability) -> bool {
        match self {
            Role::Administrator => true,
            Role::Standard => match capability {
                Capability::ManageFleet
                | Capability::ManageUsers
                | Capability::ManageRecords
                | Capability::ViewReports
                | Capability::OverrideReservations
                | Capability::ViewAllReservations
                | Capability::BookForOthers => false,
            },
        }
    }

    pub fn is_admin(self) -> bool {
        self.can(Capability::OverrideReservations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: &'static str,
    pub key: &'static str,
    pub admin_only: bool,
}

pub const ROUTES: &[RouteEntry] = &[
    RouteEntry { path: "/", key: "dashboard", admin_only: true },
    RouteEntry { path: "/vehicles", key: "vehicles", admin_only: false },
    RouteEntry { path: "/reservations", key: "reservations", admin_only: false },
    RouteEntry { path: "/users", key: "users", admin_only: true },
    RouteEntry { path: "/service-records", key: "service_records", admin_only: true },
    RouteEntry { path: "/damage-records", key: "damage_records", admin_only: true },
    RouteEntry { path: "/reports", key: "reports", admin_only: true },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Redirect(&'static str),
}

/// Where a role lands after login or after being bounced off a route.
/// The dashboard is admin-only, so standard users land on their reservations.
pub fn landing_route(role: Role) -> &'static str {
    if role.can(Capability::ViewReports) {
        "/"
    } else {
        "/reservations"
    }
}

fn route_visible(route: &RouteEntry, role: Role) -> bool {
    !route.admin_only || role.is_admin()
}

pub fn gate(path: &str, role: Role) -> Visibility {
    let normalized = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    match ROUTES.iter().find(|r| r.path == normalized) {
        Some(route) if route_visible(route, role) => Visibility::Visible,
        _ => Visibility::Redirect(landing_route(role)),
    }
}

pub fn navigation(role: Role) -> Vec<RouteEntry> {
    ROUTES
        .iter()
        .filter(|r| route_visible(r, role))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_can_everything() {
        for cap in [
            Capability::ManageFleet,
            Capability::ManageUsers,
            Capability::ManageRecords,
            Capability::ViewReports,
            Capability::OverrideReservations,
            Capability::ViewAllReservations,
            Capability::BookForOthers,
        ] {
            assert!(Role::Administrator.can(cap));
            assert!(!Role::Standard.can(cap));
        }
    }

    #[test]
    fn standard_user_redirected_from_admin_routes() {
        assert_eq!(gate("/users", Role::Standard), Visibility::Redirect("/reservations"));
        assert_eq!(gate("/", Role::Standard), Visibility::Redirect("/reservations"));
        assert_eq!(gate("/vehicles", Role::Standard), Visibility::Visible);
        assert_eq!(gate("/reservations/", Role::Standard), Visibility::Visible);
    }

    #[test]
    fn administrator_sees_all_routes() {
        for route in ROUTES {
            assert_eq!(gate(route.path, Role::Administrator), Visibility::Visible);
        }
        assert_eq!(navigation(Role::Administrator).len(), ROUTES.len());
    }

    #[test]
    fn unknown_route_goes_to_landing() {
        assert_eq!(gate("/nope", Role::Administrator), Visibility::Redirect("/"));
    }

    #[test]
    fn standard_navigation() {
        let keys: Vec<_> = navigation(Role::Standard).iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["vehicles", "reservations"]);
    }
}

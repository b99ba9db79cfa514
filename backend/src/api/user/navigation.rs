//! Role-scoped navigation menu.
//!
//! The menu is a static projection of the resolved role; it is rebuilt from
//! the resolver state on every request, so a role change shows up on the
//! next call without any invalidation.

use serde::Serialize;

use crate::auth::models::{AuthState, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> NavItem {
    NavItem { label, path }
}

const PATIENT: &[NavItem] = &[
    item("Dashboard", "/patient"),
    item("Book Appointment", "/patient/book"),
    item("Medical History", "/patient/history"),
    item("Profile", "/patient/profile"),
];

const DOCTOR: &[NavItem] = &[
    item("Dashboard", "/doctor"),
    item("Consultations", "/doctor/consult"),
    item("Patient Records", "/doctor/records"),
    item("Hospital Requests", "/doctor/requests"),
];

const ADMIN: &[NavItem] = &[
    item("Dashboard", "/admin"),
    item("Doctors", "/admin/doctors"),
    item("Appointments", "/admin/appointments"),
    item("Billing", "/admin/billing"),
    item("Hospital", "/admin/hospital"),
];

pub fn items_for(role: Role) -> &'static [NavItem] {
    match role {
        Role::Patient => PATIENT,
        Role::Doctor => DOCTOR,
        Role::Admin => ADMIN,
    }
}

#[derive(Debug, Serialize)]
pub struct Navigation {
    pub items: &'static [NavItem],
    /// The item whose path equals the current path exactly.
    pub active: Option<NavItem>,
    pub display_name: String,
    pub role: Option<Role>,
}

impl Navigation {
    pub fn build(state: &AuthState, current_path: &str) -> Self {
        let items = state.role.map(items_for).unwrap_or_default();
        let active = items.iter().find(|i| i.path == current_path).copied();
        let display_name = state
            .profile
            .as_ref()
            .map(|p| p.full_name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or("User")
            .to_string();
        Navigation {
            items,
            active,
            display_name,
            role: state.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Profile;

    #[test]
    fn each_role_has_its_own_ordered_menu() {
        let labels: Vec<&str> = items_for(Role::Admin).iter().map(|i| i.label).collect();
        assert_eq!(labels, ["Dashboard", "Doctors", "Appointments", "Billing", "Hospital"]);
        assert_eq!(items_for(Role::Patient)[1].path, "/patient/book");
        assert_eq!(items_for(Role::Doctor)[3].label, "Hospital Requests");
        for role in [Role::Patient, Role::Doctor, Role::Admin] {
            assert_eq!(items_for(role)[0].path, role.home_path());
        }
    }

    #[test]
    fn menu_follows_role_and_marks_active_item() {
        let mut state = AuthState::signed_out();
        let nav = Navigation::build(&state, "/patient");
        assert!(nav.items.is_empty());
        assert_eq!(nav.display_name, "User");

        state.role = Some(Role::Doctor);
        state.profile = Some(Profile {
            full_name: "Ada Obi".into(),
            ..Profile::default()
        });
        let nav = Navigation::build(&state, "/doctor/records");
        assert_eq!(nav.items.len(), 4);
        assert_eq!(nav.active.map(|i| i.label), Some("Patient Records"));
        assert_eq!(nav.display_name, "Ada Obi");
        assert!(Navigation::build(&state, "/doctor/records/1").active.is_none());
    }
}

//! Path to required-role mapping for page routes.
//!
//! Each role owns one path tree. Everything outside those trees (the landing
//! page, `/auth` and the `/api` helpers) is public.

use crate::auth::models::Role;

const PROTECTED: &[(&str, &[Role])] = &[
    ("/patient", &[Role::Patient]),
    ("/doctor", &[Role::Doctor]),
    ("/admin", &[Role::Admin]),
];

/// Roles allowed to render `path`, or `None` when the path is public.
pub fn required_roles(path: &str) -> Option<&'static [Role]> {
    PROTECTED.iter().find_map(|(prefix, roles)| {
        let inside = path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        inside.then_some(*roles)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_trees_are_protected() {
        assert_eq!(required_roles("/patient"), Some(&[Role::Patient][..]));
        assert_eq!(required_roles("/patient/book"), Some(&[Role::Patient][..]));
        assert_eq!(required_roles("/doctor/records/42"), Some(&[Role::Doctor][..]));
        assert_eq!(required_roles("/admin/billing/invoices"), Some(&[Role::Admin][..]));
    }

    #[test]
    fn everything_else_is_public() {
        assert_eq!(required_roles("/"), None);
        assert_eq!(required_roles("/auth"), None);
        assert_eq!(required_roles("/auth/sign-in"), None);
        assert_eq!(required_roles("/api/navigation"), None);
        assert_eq!(required_roles("/patients"), None);
        assert_eq!(required_roles("/administrator"), None);
    }
}

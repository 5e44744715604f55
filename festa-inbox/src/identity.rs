//! Role resolution for portal sessions.
//!
//! The primary source is the session's role claim; the external directory
//! lookup (an email allowlist in the hosted deployment) is consulted only
//! when the claim yields nothing.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Vendor,
}

impl Role {
    fn from_claim(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "vendor" => Some(Role::Vendor),
            _ => None,
        }
    }
}

/// Authenticated session as handed over by the auth provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub claims: HashMap<String, String>,
}

impl Session {
    pub fn role_claim(&self) -> Option<&str> {
        self.claims.get("role").map(String::as_str)
    }
}

/// Fallback role source keyed by email.
pub trait RoleDirectory {
    fn role_for(&self, email: &str) -> Option<Role>;
}

/// Static allowlist directory, useful for tests and local deployments.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, Role>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, email: &str, role: Role) -> Self {
        self.entries.insert(email.to_ascii_lowercase(), role);
        self
    }
}

impl RoleDirectory for StaticDirectory {
    fn role_for(&self, email: &str) -> Option<Role> {
        self.entries.get(&email.to_ascii_lowercase()).copied()
    }
}

/// Resolve the session's role: claim first, directory lookup only when the
/// claim is absent or unrecognized.
pub fn resolve_role(session: &Session, directory: &dyn RoleDirectory) -> Option<Role> {
    if let Some(role) = session.role_claim().and_then(Role::from_claim) {
        return Some(role);
    }
    directory.role_for(&session.email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(claims: &[(&str, &str)]) -> Session {
        Session {
            user_id: "u1".to_string(),
            email: "pat@venue.example".to_string(),
            claims: claims
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    struct CountingDirectory {
        calls: std::cell::Cell<usize>,
        role: Option<Role>,
    }

    impl RoleDirectory for CountingDirectory {
        fn role_for(&self, _email: &str) -> Option<Role> {
            self.calls.set(self.calls.get() + 1);
            self.role
        }
    }

    #[test]
    fn test_claim_wins_without_directory_call() {
        let directory = CountingDirectory {
            calls: std::cell::Cell::new(0),
            role: Some(Role::Admin),
        };
        let role = resolve_role(&session(&[("role", "vendor")]), &directory);
        assert_eq!(role, Some(Role::Vendor));
        assert_eq!(directory.calls.get(), 0, "fallback must not be consulted");
    }

    #[test]
    fn test_missing_claim_falls_back_to_directory() {
        let directory = StaticDirectory::new().with_entry("pat@venue.example", Role::Vendor);
        assert_eq!(resolve_role(&session(&[]), &directory), Some(Role::Vendor));
    }

    #[test]
    fn test_unrecognized_claim_falls_back() {
        let directory = StaticDirectory::new().with_entry("pat@venue.example", Role::Admin);
        let role = resolve_role(&session(&[("role", "superuser")]), &directory);
        assert_eq!(role, Some(Role::Admin));
    }

    #[test]
    fn test_no_claim_no_directory_entry() {
        let directory = StaticDirectory::new();
        assert_eq!(resolve_role(&session(&[]), &directory), None);
    }

    #[test]
    fn test_directory_lookup_is_case_insensitive() {
        let directory = StaticDirectory::new().with_entry("Pat@Venue.Example", Role::Vendor);
        assert_eq!(resolve_role(&session(&[]), &directory), Some(Role::Vendor));
    }
}

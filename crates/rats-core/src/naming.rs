//! Unique fixture names.
//!
//! Scenarios may run concurrently against one shared org/space, so every app,
//! buildpack, org and user name must be unique for the lifetime of the run.

use uuid::Uuid;

/// Prefix for apps pushed by the fixture orchestrator.
pub const APP_PREFIX: &str = "RATS-APP-";

/// Random name with a fixed prefix, e.g. `RATS-APP-3f0c…`.
pub fn prefixed_random_name(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

/// Random name without a prefix.
pub fn random_name() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prefixed_name_keeps_prefix() {
        let name = prefixed_random_name(APP_PREFIX);
        assert!(name.starts_with(APP_PREFIX));
        assert!(name.len() > APP_PREFIX.len());
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<String> = (0..1000).map(|_| random_name()).collect();
        assert_eq!(names.len(), 1000);
    }
}

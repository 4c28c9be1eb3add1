//! Shared test utilities for unit tests
//!
//! Integration tests (in tests/) cannot access this module because it's
//! marked with #[cfg(test)]; they use tests/common/mod.rs instead.

use crate::types::{OrganizationId, TimeEntry, TimeEntryId, UserId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::env;

// Serializes environment variable modifications across tests
pub static ENV_MUTEX: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

/// Parse an RFC 3339 timestamp into UTC
pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap()
        .with_timezone(&Utc)
}

/// Finished, non-billable entry between two RFC 3339 instants
pub fn entry_between(start: &str, end: &str) -> TimeEntry {
    TimeEntry {
        id: TimeEntryId::new_v4(),
        user_id: UserId::new_v4(),
        organization_id: OrganizationId::new_v4(),
        project_id: None,
        task_id: None,
        client_id: None,
        start: ts(start),
        end: Some(ts(end)),
        billable: false,
        billable_rate: None,
        tags: Vec::new(),
        description: String::new(),
    }
}

/// RAII guard restoring environment variables on drop
#[derive(Default)]
pub struct EnvVarGuard {
    vars: Vec<(String, Option<String>)>,
}

impl EnvVarGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, remembering its previous value
    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.push((key.to_string(), env::var(key).ok()));
        // env::set_var is unsafe since edition 2024
        unsafe {
            env::set_var(key, value);
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.vars.iter().rev() {
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

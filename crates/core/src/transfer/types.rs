//! Types for the transfer module.

use serde::{Deserialize, Serialize};

/// An object found under a remote prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Full remote location of the object.
    pub path: String,
    /// Object size in bytes.
    pub size_bytes: u64,
}

/// Joins a child name onto a remote location with exactly one `/` between them.
pub fn join_location(base: &str, name: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

/// Path of `location` relative to `prefix`, if it lies under it.
pub fn relative_to<'a>(prefix: &str, location: &'a str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    location
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

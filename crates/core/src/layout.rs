//! Canonical object-store layout for bundle archives and manifest trees.
//!
//! ```text
//! orgs/{org_id}/apps/{app_id}/{version}.zip      bundle archive
//! orgs/{org_id}/apps/{app_id}/{version}/...      manifest file tree
//! apps/{user_id}/{app_id}/versions/{bucket_id}   legacy layout, always orphaned
//! ```

use serde::{Deserialize, Serialize};

/// Root of the canonical layout.
pub const ORGS_ROOT: &str = "orgs/";

/// Root of the legacy per-user layout.
pub const LEGACY_ROOT: &str = "apps/";

/// Path component marking a delta sub-path inside a manifest tree.
pub const DELTA_COMPONENT: &str = "delta";

const ARCHIVE_SUFFIX: &str = ".zip";

/// Where a store key sits in the layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreLocation {
    /// A bundle archive.
    Archive {
        org_id: String,
        app_id: String,
        version: String,
    },
    /// A file inside a version's manifest tree.
    ManifestFile {
        org_id: String,
        app_id: String,
        version: String,
        /// Whether the file lives under a `delta` sub-path.
        delta: bool,
    },
    /// Anything under the legacy root.
    Legacy,
    /// Keys outside both layouts.
    Unknown,
}

/// Prefix holding every object of one organization.
pub fn org_prefix(org_id: &str) -> String {
    format!("{ORGS_ROOT}{org_id}/")
}

/// Prefix holding every object of one app.
pub fn app_prefix(org_id: &str, app_id: &str) -> String {
    format!("{ORGS_ROOT}{org_id}/apps/{app_id}/")
}

/// Key of a version's bundle archive.
pub fn archive_key(org_id: &str, app_id: &str, version: &str) -> String {
    format!("{}{version}{ARCHIVE_SUFFIX}", app_prefix(org_id, app_id))
}

/// Prefix of a version's manifest file tree.
pub fn manifest_prefix(org_id: &str, app_id: &str, version: &str) -> String {
    format!("{}{version}/", app_prefix(org_id, app_id))
}

/// Whether any path component is a delta marker.
pub fn is_delta_path(key: &str) -> bool {
    key.split('/').any(|c| c == DELTA_COMPONENT)
}

/// The `orgs/{org}/apps/{app}/{version}` folder a key belongs to, if any.
///
/// Archives map to the folder of the same version, so `1.0.0.zip` and
/// `1.0.0/` share a folder.
pub fn version_folder_of(key: &str) -> Option<String> {
    match parse_location(key) {
        StoreLocation::Archive {
            org_id,
            app_id,
            version,
        }
        | StoreLocation::ManifestFile {
            org_id,
            app_id,
            version,
            ..
        } => Some(format!("{}{version}", app_prefix(&org_id, &app_id))),
        StoreLocation::Legacy | StoreLocation::Unknown => None,
    }
}

/// Classify a store key.
pub fn parse_location(key: &str) -> StoreLocation {
    if key.starts_with(LEGACY_ROOT) {
        return StoreLocation::Legacy;
    }
    let Some(rest) = key.strip_prefix(ORGS_ROOT) else {
        return StoreLocation::Unknown;
    };

    let parts: Vec<&str> = rest.split('/').collect();
    // org / "apps" / app / version-or-archive [/ ...]
    if parts.len() < 4 || parts[1] != "apps" || parts.iter().take(3).any(|p| p.is_empty()) {
        return StoreLocation::Unknown;
    }
    let org_id = parts[0].to_string();
    let app_id = parts[2].to_string();

    if parts.len() == 4 {
        return match parts[3].strip_suffix(ARCHIVE_SUFFIX) {
            Some(version) if !version.is_empty() => StoreLocation::Archive {
                org_id,
                app_id,
                version: version.to_string(),
            },
            _ => StoreLocation::Unknown,
        };
    }

    if parts[3].is_empty() || parts.last().is_some_and(|p| p.is_empty()) {
        return StoreLocation::Unknown;
    }
    StoreLocation::ManifestFile {
        org_id,
        app_id,
        version: parts[3].to_string(),
        delta: parts[4..].contains(&DELTA_COMPONENT),
    }
}

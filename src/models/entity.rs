//! Tracked entity metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile of a timeline owner as reported by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Source-side identity, used for timeline requests.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Handle; the entity's collection is addressed by it.
    pub username: String,
    /// Any further profile attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserInfo {
    /// Creates a user with no extra attributes.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            name: username.clone(),
            username,
            extra: Map::new(),
        }
    }
}

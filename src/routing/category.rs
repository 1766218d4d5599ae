//! Entity categories and their table/column preferences.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A semantic grouping used to guess which table and columns answer a
/// lookup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Users,
    Roles,
    Sensors,
    Hardware,
}

impl EntityCategory {
    /// Every category, in detection order.
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::Users,
        EntityCategory::Roles,
        EntityCategory::Sensors,
        EntityCategory::Hardware,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityCategory::Users => "users",
            EntityCategory::Roles => "roles",
            EntityCategory::Sensors => "sensors",
            EntityCategory::Hardware => "hardware",
        }
    }

    /// Substrings that mark a table (or a request word) as belonging to this
    /// category.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            EntityCategory::Users => &["user", "account", "member", "person", "people"],
            EntityCategory::Roles => &["role", "permission", "group"],
            EntityCategory::Sensors => &["sensor", "device", "probe"],
            EntityCategory::Hardware => &["hardware", "equipment", "machine", "asset"],
        }
    }

    /// Identifier columns, most preferred first.
    pub fn id_columns(&self) -> &'static [&'static str] {
        match self {
            EntityCategory::Users => &["user_id", "id", "uid", "account_id"],
            EntityCategory::Roles => &["role_id", "id"],
            EntityCategory::Sensors => &["sensor_id", "device_id", "id"],
            EntityCategory::Hardware => &["hardware_id", "equipment_id", "asset_id", "id"],
        }
    }

    /// Label columns, most preferred first.
    pub fn label_columns(&self) -> &'static [&'static str] {
        match self {
            EntityCategory::Users => &["username", "name", "full_name", "email", "login"],
            EntityCategory::Roles => &["role_name", "name", "title", "description"],
            EntityCategory::Sensors => &[
                "sensor_name",
                "name",
                "device_name",
                "label",
                "serial_number",
            ],
            EntityCategory::Hardware => &[
                "hardware_name",
                "name",
                "model",
                "serial_number",
                "label",
            ],
        }
    }

    /// Whether a lowercase request word names this category, allowing a
    /// plural `s` ("users", "sensors").
    pub fn matches_word(&self, word: &str) -> bool {
        let singular = word.strip_suffix('s').unwrap_or(word);
        self.keywords()
            .iter()
            .any(|kw| word == *kw || singular == *kw)
    }

    /// The category of the first word that names one.
    pub fn detect<S: AsRef<str>>(words: &[S]) -> Option<Self> {
        words.iter().find_map(|word| {
            Self::ALL
                .into_iter()
                .find(|category| category.matches_word(word.as_ref()))
        })
    }

    /// Distinct categories named anywhere in `words`, in order of first mention.
    pub fn mentioned<S: AsRef<str>>(words: &[S]) -> Vec<Self> {
        let mut found = Vec::new();
        for word in words {
            for category in Self::ALL {
                if category.matches_word(word.as_ref()) && !found.contains(&category) {
                    found.push(category);
                }
            }
        }
        found
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.name() == lower || category.matches_word(&lower))
            .ok_or_else(|| format!("Unknown entity category: {}", s))
    }
}

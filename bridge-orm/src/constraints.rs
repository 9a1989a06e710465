//! # Constraint Catalog
//!
//! Names of schema constraints mapped to human-readable descriptions.
//!
//! A violated constraint is reported by the database with its name embedded in
//! the error message. Rather than writing one converter per entity, every
//! foreign key and unique index that callers may trip over gets one entry here,
//! and the [`ConstraintViolationConverter`](crate::converter::ConstraintViolationConverter)
//! uses the entries to phrase its messages.
//!
//! - **Foreign keys**: the description names what references the entity being
//!   deleted or updated ("a schedule"). Constraints that cascade deletes do not
//!   need an entry.
//! - **Unique keys**: the description names the duplicated fields ("session GUIDs").
//!
//! ## Loading from JSON
//!
//! ```json
//! {
//!   "foreign_keys": [["Schedule-Organization-Constraint", "a schedule"]],
//!   "unique_keys": [["PRIMARY", "primary keys"]]
//! }
//! ```
//!
//! Entries are pairs rather than an object so their order survives parsing;
//! lookups are order-sensitive.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

/// An ordered list of constraint name → description entries.
///
/// Lookups scan the entries in registration order and the first name contained
/// in the message wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct ConstraintTable {
    entries: Vec<(String, String)>,
}

impl ConstraintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. Registering a name twice keeps the first description.
    pub fn with(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        if self.description_of(&name).is_none() {
            self.entries.push((name, description.into()));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }

    /// Exact lookup by constraint name.
    pub fn description_of(&self, name: &str) -> Option<&str> {
        self.iter().find(|(n, _)| *n == name).map(|(_, d)| d)
    }

    /// All entries whose name occurs in `message`, in registration order.
    pub fn matches<'a>(&'a self, message: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.iter().filter(move |(name, _)| message.contains(*name))
    }

    /// The description of the first entry whose name occurs in `message`.
    ///
    /// Logs a warning when more than one entry matches.
    pub fn lookup(&self, message: &str) -> Option<&str> {
        let matched: Vec<(&str, &str)> = self.matches(message).collect();
        if matched.len() > 1 {
            let names: Vec<&str> = matched.iter().map(|(n, _)| *n).collect();
            log::warn!("Constraint message matches several entries {:?}; using {}", names, names[0]);
        }
        matched.first().map(|(_, description)| *description)
    }

    /// Pairs of entries where the first name is contained in the second.
    ///
    /// Such pairs make lookups depend on registration order.
    pub fn overlapping_names(&self) -> Vec<(&str, &str)> {
        let mut overlaps = Vec::new();
        for (i, (a, _)) in self.entries.iter().enumerate() {
            for (j, (b, _)) in self.entries.iter().enumerate() {
                if i != j && b.contains(a.as_str()) {
                    overlaps.push((a.as_str(), b.as_str()));
                }
            }
        }
        overlaps
    }
}

impl<N: Into<String>, D: Into<String>> FromIterator<(N, D)> for ConstraintTable {
    fn from_iter<T: IntoIterator<Item = (N, D)>>(iter: T) -> Self {
        iter.into_iter().fold(ConstraintTable::new(), |table, (n, d)| table.with(n, d))
    }
}

impl From<Vec<(String, String)>> for ConstraintTable {
    fn from(entries: Vec<(String, String)>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<ConstraintTable> for Vec<(String, String)> {
    fn from(table: ConstraintTable) -> Self {
        table.entries
    }
}

/// The foreign-key and unique-key tables used to classify integrity violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintCatalog {
    #[serde(default)]
    pub foreign_keys: ConstraintTable,
    #[serde(default)]
    pub unique_keys: ConstraintTable,
}

impl Default for ConstraintCatalog {
    /// The constraints of the Bridge schema.
    fn default() -> Self {
        Self::empty()
            .with_foreign_key("AssessmentRef-Assessment-Constraint", "a scheduling session")
            .with_foreign_key("Schedule-Organization-Constraint", "a schedule")
            .with_unique_key("PRIMARY", "primary keys")
            .with_unique_key("TimeWindow-guid-sessionGuid-idx", "time window GUIDs")
            .with_unique_key("Session-guid-scheduleGuid-idx", "session GUIDs")
    }
}

impl ConstraintCatalog {
    /// A catalog with no entries; every violation gets the generic message.
    pub fn empty() -> Self {
        Self { foreign_keys: ConstraintTable::new(), unique_keys: ConstraintTable::new() }
    }

    pub fn with_foreign_key(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.foreign_keys = self.foreign_keys.with(name, description);
        self
    }

    pub fn with_unique_key(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.unique_keys = self.unique_keys.with(name, description);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

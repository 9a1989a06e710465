//! # Constraint Violation Converter
//!
//! Translates persistence failures into stable, user-safe error categories.
//!
//! One converter serves every entity. Integrity violations are phrased using
//! the [`ConstraintCatalog`]: supporting a new foreign key or unique index means
//! adding one catalog entry, not new classification code.
//!
//! Classification happens in two steps. [`FailureShape::of`] decides which of a
//! small closed set of shapes a failure has, walking the error's cause chain for
//! the lowest-level integrity violation. The converter then turns the shape
//! into exactly one [`ClassifiedError`]. Neither step can fail.
//!
//! ## Example
//!
//! ```rust,ignore
//! let converter = ConstraintViolationConverter::new(ConstraintCatalog::default());
//!
//! if let Err(e) = db.execute(&delete_schedule).await {
//!     return Err(converter.convert(e, &schedule));
//! }
//! ```

use std::borrow::Cow;
use std::error::Error as StdError;
use std::sync::Arc;

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::{
    constraints::{ConstraintCatalog, ConstraintTable},
    entity::Entity,
    errors::{IntegrityViolation, PersistenceError},
};

// ============================================================================
// Messages and Markers
// ============================================================================

const IN_USE_MSG: &str = "Cannot update or delete this item because it is in use.";

/// Message fragments that identify a duplicate-key violation (MySQL, SQLite, Postgres).
const DUPLICATE_MARKERS: &[&str] = &["Duplicate entry", "UNIQUE constraint failed", "duplicate key value"];

/// Message fragments that identify a foreign-key violation (MySQL, SQLite, Postgres).
const FOREIGN_KEY_MARKERS: &[&str] =
    &["a foreign key constraint fails", "FOREIGN KEY constraint failed", "violates foreign key constraint"];

fn version_conflict_msg(name: &str) -> String {
    format!("{} has the wrong version number; it may have been saved in the background.", name)
}

fn non_unique_msg(name: &str, identifier: &str) -> String {
    format!("Another {} has already used a value which must be unique: {}", name, identifier)
}

fn unique_constraint_msg(name: &str, description: &str) -> String {
    format!("Cannot update this {} because it has duplicate {}", name, description)
}

fn fk_constraint_msg(name: &str, description: &str) -> String {
    format!("This {} cannot be deleted or updated because it is referenced by {}.", name, description)
}

// ============================================================================
// Classified Errors
// ============================================================================

/// The caller-facing result of classifying a persistence failure.
#[derive(Error, Debug)]
pub enum ClassifiedError {
    /// The entity was saved concurrently; re-read and retry.
    #[error("{message}")]
    ConcurrencyConflict { message: String },

    /// A value that must be unique is already used; change it.
    #[error("{message}")]
    UniquenessConflict { message: String },

    /// Other rows depend on the entity; remove them first.
    #[error("{message}")]
    ReferentialConflict { message: String },

    /// Not a recognised failure. Log it; do not show it to users.
    #[error(transparent)]
    Unclassified(PersistenceError),
}

impl ClassifiedError {
    /// The user-facing message, `None` for unclassified failures.
    pub fn message(&self) -> Option<&str> {
        match self {
            ClassifiedError::ConcurrencyConflict { message }
            | ClassifiedError::UniquenessConflict { message }
            | ClassifiedError::ReferentialConflict { message } => Some(message),
            ClassifiedError::Unclassified(_) => None,
        }
    }

    /// The HTTP status the failure should be reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            ClassifiedError::Unclassified(_) => 500,
            _ => 409,
        }
    }
}

// ============================================================================
// Failure Shapes
// ============================================================================

/// What kind of integrity constraint was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Duplicate,
    ForeignKey,
    Other,
}

impl ViolationKind {
    /// Reads the kind off the database message, if the message says.
    fn from_message(message: &str) -> Option<Self> {
        if DUPLICATE_MARKERS.iter().any(|m| message.contains(m)) {
            Some(ViolationKind::Duplicate)
        } else if FOREIGN_KEY_MARKERS.iter().any(|m| message.contains(m)) {
            Some(ViolationKind::ForeignKey)
        } else {
            None
        }
    }
}

/// An integrity violation found in a cause chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation<'e> {
    pub kind: ViolationKind,
    /// Raw database message. Never shown to users.
    pub message: &'e str,
    /// Constraint name, when the driver reports it separately (Postgres).
    pub constraint: Option<&'e str>,
}

/// The closed set of failures the converter recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureShape<'e> {
    VersionConflict,
    DuplicateIdentity { identifier: &'e str },
    IntegrityViolation(Violation<'e>),
    Unrecognized,
}

impl<'e> FailureShape<'e> {
    pub fn of(error: &'e PersistenceError) -> Self {
        match error {
            PersistenceError::OptimisticLock { .. } => FailureShape::VersionConflict,
            PersistenceError::NonUniqueObject { identifier } => FailureShape::DuplicateIdentity { identifier },
            _ => root_violation(error).map(FailureShape::IntegrityViolation).unwrap_or(FailureShape::Unrecognized),
        }
    }
}

/// The deepest integrity violation in the cause chain of `error`.
fn root_violation(error: &PersistenceError) -> Option<Violation<'_>> {
    let mut found = match error {
        PersistenceError::Database(e) => sqlx_violation(e),
        _ => None,
    };
    let mut next = error.source();
    while let Some(cause) = next {
        if let Some(violation) = link_violation(cause) {
            found = Some(violation);
        }
        next = cause.source();
    }
    found
}

fn link_violation<'e>(cause: &'e (dyn StdError + 'static)) -> Option<Violation<'e>> {
    if let Some(e) = cause.downcast_ref::<sqlx::Error>() {
        return sqlx_violation(e);
    }
    // `Database` is transparent, so its own `source()` skips the sqlx link.
    if let Some(PersistenceError::Database(e)) = cause.downcast_ref::<PersistenceError>() {
        return sqlx_violation(e);
    }
    cause.downcast_ref::<IntegrityViolation>().map(|v| Violation {
        kind: ViolationKind::from_message(&v.message).unwrap_or(ViolationKind::Other),
        message: &v.message,
        constraint: None,
    })
}

fn sqlx_violation(error: &sqlx::Error) -> Option<Violation<'_>> {
    let sqlx::Error::Database(db) = error else {
        return None;
    };
    let message = db.message();
    let from_driver = match db.kind() {
        ErrorKind::UniqueViolation => Some(ViolationKind::Duplicate),
        ErrorKind::ForeignKeyViolation => Some(ViolationKind::ForeignKey),
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => Some(ViolationKind::Other),
        _ => None,
    };
    // SQLSTATE class 23 is "integrity constraint violation".
    let integrity_state = db.code().is_some_and(|c| c.len() == 5 && c.starts_with("23"));
    let kind = ViolationKind::from_message(message).or(from_driver);

    if kind.is_none() && !integrity_state {
        return None;
    }
    Some(Violation { kind: kind.unwrap_or(ViolationKind::Other), message, constraint: db.constraint() })
}

// ============================================================================
// Converter
// ============================================================================

/// Converts persistence failures for any entity into [`ClassifiedError`]s.
pub trait PersistenceErrorConverter: Send + Sync {
    fn convert(&self, error: PersistenceError, entity: &dyn Entity) -> ClassifiedError;
}

/// The catalog-driven converter for MySQL-style constraint messages.
///
/// Cheap to clone; the catalog is shared and never modified.
#[derive(Debug, Clone)]
pub struct ConstraintViolationConverter {
    catalog: Arc<ConstraintCatalog>,
}

impl Default for ConstraintViolationConverter {
    fn default() -> Self {
        Self::new(ConstraintCatalog::default())
    }
}

impl ConstraintViolationConverter {
    /// Creates a converter over `catalog`.
    ///
    /// Logs a warning for every pair of constraint names where one contains the
    /// other, since lookups for those depend on registration order.
    pub fn new(catalog: ConstraintCatalog) -> Self {
        for (table, label) in [(&catalog.foreign_keys, "foreign key"), (&catalog.unique_keys, "unique key")] {
            for (inner, outer) in table.overlapping_names() {
                log::warn!("{} constraint name {} is contained in {}", label, inner, outer);
            }
        }
        Self { catalog: Arc::new(catalog) }
    }

    pub fn catalog(&self) -> &ConstraintCatalog {
        &self.catalog
    }

    /// Phrases an integrity violation for the entity named `name`.
    fn describe(&self, violation: &Violation<'_>, name: &str) -> ClassifiedError {
        let name = name.to_lowercase();
        match violation.kind {
            ViolationKind::Duplicate => {
                let message = lookup(&self.catalog.unique_keys, violation)
                    .map(|d| unique_constraint_msg(&name, d))
                    .unwrap_or_else(|| IN_USE_MSG.to_string());
                ClassifiedError::UniquenessConflict { message }
            }
            ViolationKind::ForeignKey => {
                let message = lookup(&self.catalog.foreign_keys, violation)
                    .map(|d| fk_constraint_msg(&name, d))
                    .unwrap_or_else(|| IN_USE_MSG.to_string());
                ClassifiedError::ReferentialConflict { message }
            }
            ViolationKind::Other => ClassifiedError::ReferentialConflict { message: IN_USE_MSG.to_string() },
        }
    }
}

/// Finds the description for a violation: by the reported constraint name if
/// there is one, otherwise by scanning the message.
fn lookup<'c>(table: &'c ConstraintTable, violation: &Violation<'_>) -> Option<&'c str> {
    let description = violation
        .constraint
        .and_then(|c| table.description_of(c))
        .or_else(|| table.lookup(violation.message));
    if description.is_none() {
        log::warn!("No catalog entry for {:?} violation: {}", violation.kind, violation.message);
    }
    description
}

impl PersistenceErrorConverter for ConstraintViolationConverter {
    fn convert(&self, error: PersistenceError, entity: &dyn Entity) -> ClassifiedError {
        let name: Cow<'static, str> = entity.type_name();
        let classified = match FailureShape::of(&error) {
            FailureShape::VersionConflict => {
                Some(ClassifiedError::ConcurrencyConflict { message: version_conflict_msg(&name) })
            }
            FailureShape::DuplicateIdentity { identifier } => Some(ClassifiedError::UniquenessConflict {
                message: non_unique_msg(&name.to_lowercase(), identifier),
            }),
            FailureShape::IntegrityViolation(violation) => Some(self.describe(&violation, &name)),
            FailureShape::Unrecognized => None,
        };
        match classified {
            Some(c) => c,
            None => {
                log::debug!("Leaving {} failure unclassified: {}", name, error);
                ClassifiedError::Unclassified(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Schedule;
    impl Entity for Schedule {}

    struct Session;
    impl Entity for Session {}

    struct Assessment;
    impl Entity for Assessment {}

    fn converter() -> ConstraintViolationConverter {
        ConstraintViolationConverter::default()
    }

    /// persistence failure -> statement failure -> integrity violation
    fn nested_violation(message: &str) -> PersistenceError {
        #[derive(Debug, Error)]
        #[error("could not execute statement")]
        struct StatementFailure(#[source] IntegrityViolation);

        PersistenceError::wrap("constraint violation", StatementFailure(IntegrityViolation::new(message)))
    }

    #[test]
    fn test_optimistic_lock() {
        let err = PersistenceError::OptimisticLock { entity: "Schedule".into(), message: "stale".into() };
        let result = converter().convert(err, &Schedule);
        assert!(matches!(result, ClassifiedError::ConcurrencyConflict { .. }));
        assert_eq!(
            result.message(),
            Some("Schedule has the wrong version number; it may have been saved in the background.")
        );
        assert_eq!(result.status_code(), 409);
    }

    #[test]
    fn test_non_unique_object() {
        let err = PersistenceError::NonUniqueObject { identifier: "oneGuid".into() };
        let result = converter().convert(err, &Schedule);
        assert!(matches!(result, ClassifiedError::UniquenessConflict { .. }));
        assert_eq!(result.message(), Some("Another schedule has already used a value which must be unique: oneGuid"));
    }

    #[test]
    fn test_foreign_key_scenario() {
        let err = nested_violation(
            "Cannot delete or update a parent row: a foreign key constraint fails \
             (`bridgedb`.`Schedules`, CONSTRAINT `Schedule-Organization-Constraint` FOREIGN KEY (`appId`, `ownerId`) \
             REFERENCES `Organizations` (`appId`, `identifier`))",
        );
        let result = converter().convert(err, &Schedule);
        assert!(matches!(result, ClassifiedError::ReferentialConflict { .. }));
        assert_eq!(
            result.to_string(),
            "This schedule cannot be deleted or updated because it is referenced by a schedule."
        );
    }

    #[test]
    fn test_assessment_reference_foreign_key() {
        let err = nested_violation(
            "Cannot delete or update a parent row: a foreign key constraint fails (`bridgedb`.`SessionAssessments`, \
             CONSTRAINT `AssessmentRef-Assessment-Constraint` FOREIGN KEY (`guid`) REFERENCES `Assessments` (`guid`))",
        );
        let result = converter().convert(err, &Assessment);
        assert_eq!(
            result.message(),
            Some("This assessment cannot be deleted or updated because it is referenced by a scheduling session.")
        );
    }

    #[test]
    fn test_duplicate_entry_scenario() {
        let err = nested_violation("Duplicate entry 'oneGuid-scheduleGuid' for key 'Session-guid-scheduleGuid-idx'");
        let result = converter().convert(err, &Session);
        assert!(matches!(result, ClassifiedError::UniquenessConflict { .. }));
        assert_eq!(result.message(), Some("Cannot update this session because it has duplicate session GUIDs"));
    }

    #[test]
    fn test_duplicate_primary_key() {
        let err = nested_violation("Duplicate entry 'api-oneGuid' for key 'PRIMARY'");
        let result = converter().convert(err, &Schedule);
        assert_eq!(result.message(), Some("Cannot update this schedule because it has duplicate primary keys"));
    }

    #[test]
    fn test_unregistered_constraint_falls_back_to_generic_message() {
        let duplicate = converter().convert(nested_violation("Duplicate entry 'x' for key 'Unknown-idx'"), &Schedule);
        assert!(matches!(duplicate, ClassifiedError::UniquenessConflict { .. }));
        assert_eq!(duplicate.message(), Some(IN_USE_MSG));

        let fk_failure = nested_violation("a foreign key constraint fails (`Other-Constraint`)");
        let fk = converter().convert(fk_failure, &Schedule);
        assert!(matches!(fk, ClassifiedError::ReferentialConflict { .. }));
        assert_eq!(fk.message(), Some(IN_USE_MSG));
    }

    #[test]
    fn test_unrecognized_integrity_message_is_generic() {
        let result = converter().convert(nested_violation("Column 'name' cannot be null"), &Schedule);
        assert!(matches!(result, ClassifiedError::ReferentialConflict { .. }));
        assert_eq!(result.message(), Some("Cannot update or delete this item because it is in use."));
    }

    #[test]
    fn test_generic_message_never_leaks_raw_text() {
        let raw = "Duplicate entry 'secret-value' for key 'hidden_index'";
        let result = converter().convert(nested_violation(raw), &Schedule);
        let message = result.message().unwrap();
        assert!(!message.is_empty());
        assert!(!message.contains("secret-value"));
        assert!(!message.contains("hidden_index"));
    }

    #[test]
    fn test_empty_catalog_uses_generic_messages() {
        let converter = ConstraintViolationConverter::new(ConstraintCatalog::empty());
        let err = nested_violation("Duplicate entry 'x' for key 'Session-guid-scheduleGuid-idx'");
        assert_eq!(converter.convert(err, &Session).message(), Some(IN_USE_MSG));
    }

    #[test]
    fn test_custom_catalog_is_used() {
        let catalog = ConstraintCatalog::empty().with_foreign_key("Study-Org-Constraint", "a study");
        let converter = ConstraintViolationConverter::new(catalog);
        let err = nested_violation("a foreign key constraint fails (CONSTRAINT `Study-Org-Constraint`)");
        assert_eq!(
            converter.convert(err, &Schedule).message(),
            Some("This schedule cannot be deleted or updated because it is referenced by a study.")
        );
    }

    #[test]
    fn test_first_registered_constraint_wins() {
        let catalog = ConstraintCatalog::empty()
            .with_unique_key("Window-idx", "window keys")
            .with_unique_key("TimeWindow-idx", "time window keys");
        let converter = ConstraintViolationConverter::new(catalog);
        let err = nested_violation("Duplicate entry 'x' for key 'TimeWindow-idx'");
        assert_eq!(
            converter.convert(err, &Schedule).message(),
            Some("Cannot update this schedule because it has duplicate window keys")
        );
    }

    #[test]
    fn test_only_integrity_links_are_inspected() {
        #[derive(Debug, Error)]
        #[error("a foreign key constraint fails (`Schedule-Organization-Constraint`)")]
        struct Outer(#[source] IntegrityViolation);

        let inner = IntegrityViolation::new("Duplicate entry 'x' for key 'PRIMARY'");
        let err = PersistenceError::wrap("failed", Outer(inner));
        let result = converter().convert(err, &Schedule);
        assert_eq!(result.message(), Some("Cannot update this schedule because it has duplicate primary keys"));
    }

    #[test]
    fn test_unrecognized_is_returned_unchanged() {
        let err = PersistenceError::Database(sqlx::Error::RowNotFound);
        let result = converter().convert(err, &Schedule);
        match result {
            ClassifiedError::Unclassified(PersistenceError::Database(sqlx::Error::RowNotFound)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrapped_non_integrity_error_is_unclassified() {
        let err = PersistenceError::wrap("boom", std::io::Error::other("disk full"));
        let result = converter().convert(err, &Schedule);
        assert!(matches!(result, ClassifiedError::Unclassified(PersistenceError::Wrapped { .. })));
        assert_eq!(result.status_code(), 500);
        assert_eq!(result.message(), None);
    }

    #[test]
    fn test_failure_shape_of() {
        let lock = PersistenceError::OptimisticLock { entity: "Schedule".into(), message: "stale".into() };
        assert_eq!(FailureShape::of(&lock), FailureShape::VersionConflict);

        let dup = PersistenceError::NonUniqueObject { identifier: "guid".into() };
        assert_eq!(FailureShape::of(&dup), FailureShape::DuplicateIdentity { identifier: "guid" });

        let fk = nested_violation("a foreign key constraint fails");
        assert_eq!(
            FailureShape::of(&fk),
            FailureShape::IntegrityViolation(Violation {
                kind: ViolationKind::ForeignKey,
                message: "a foreign key constraint fails",
                constraint: None,
            })
        );

        let pool = PersistenceError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(FailureShape::of(&pool), FailureShape::Unrecognized);
    }

    #[test]
    fn test_violation_kind_markers() {
        assert_eq!(ViolationKind::from_message("Duplicate entry 'a' for key 'b'"), Some(ViolationKind::Duplicate));
        assert_eq!(ViolationKind::from_message("UNIQUE constraint failed: t.c"), Some(ViolationKind::Duplicate));
        assert_eq!(ViolationKind::from_message("FOREIGN KEY constraint failed"), Some(ViolationKind::ForeignKey));
        assert_eq!(ViolationKind::from_message("Column cannot be null"), None);
    }

    #[derive(Debug)]
    struct MySqlError(&'static str);

    impl std::fmt::Display for MySqlError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for MySqlError {}

    impl sqlx::error::DatabaseError for MySqlError {
        fn message(&self) -> &str {
            self.0
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23000"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn sqlx_failure(message: &'static str) -> PersistenceError {
        PersistenceError::Database(sqlx::Error::Database(Box::new(MySqlError(message))))
    }

    #[test]
    fn test_sqlx_violation_at_top_level() {
        let err = sqlx_failure("Duplicate entry 'a-b' for key 'Session-guid-scheduleGuid-idx'");
        let result = converter().convert(err, &Session);
        assert_eq!(result.message(), Some("Cannot update this session because it has duplicate session GUIDs"));
    }

    #[test]
    fn test_sqlx_violation_inside_wrapped_failure() {
        let inner = sqlx_failure("Duplicate entry 'a-b' for key 'Session-guid-scheduleGuid-idx'");
        let err = PersistenceError::wrap("could not save session", inner);
        let result = converter().convert(err, &Session);
        assert!(matches!(result, ClassifiedError::UniquenessConflict { .. }));
        assert_eq!(result.message(), Some("Cannot update this session because it has duplicate session GUIDs"));
        assert_eq!(result.status_code(), 409);
    }

    #[test]
    fn test_converter_is_usable_as_trait_object() {
        let converter: Arc<dyn PersistenceErrorConverter> = Arc::new(converter());
        let err = PersistenceError::NonUniqueObject { identifier: "x".into() };
        assert!(matches!(converter.convert(err, &Session), ClassifiedError::UniquenessConflict { .. }));
    }
}

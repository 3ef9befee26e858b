//! Dialect-agnostic migration descriptions.
//!
//! A [`Migration`] describes one table: its fields, its primary key columns
//! (fields flagged `primary_key`) and the foreign keys it declares. The table
//! name doubles as the migration's identity in the ledger.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single column of a migrated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationField {
    /// Column name.
    pub name: String,
    /// Dialect-native type token, e.g. `INT` or `VARCHAR(255)`.
    pub data_type: String,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the backend should generate values for the column.
    #[serde(default)]
    pub auto_increment: bool,
}

impl MigrationField {
    /// Creates a non-nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// Marks the column as nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// A foreign key constraint declared by a migration.
///
/// `reference_table` must be created by the same or an earlier migration in
/// the batch. Nothing checks this ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Referencing column in the migrated table.
    pub column: String,
    /// Referenced table.
    pub reference_table: String,
    /// Referenced column.
    pub reference_column: String,
}

impl ForeignKey {
    /// Creates a foreign key `column -> reference_table(reference_column)`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        reference_table: impl Into<String>,
        reference_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            reference_table: reference_table.into(),
            reference_column: reference_column.into(),
        }
    }
}

/// A dialect-agnostic table migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Table name, also the migration's ledger name.
    pub table_name: String,
    /// Free-form description stored in the ledger.
    #[serde(default)]
    pub description: String,
    /// Columns in declaration order.
    #[serde(default)]
    pub fields: Vec<MigrationField>,
    /// Foreign keys in declaration order.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Migration {
    /// Creates an empty migration for the given table.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            description: String::new(),
            fields: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: MigrationField) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends several fields.
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = MigrationField>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Appends a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Appends a plain non-nullable field in place.
    pub fn add_field(&mut self, name: impl Into<String>, data_type: impl Into<String>) {
        self.fields.push(MigrationField::new(name, data_type));
    }

    /// Returns the primary key columns in declaration order.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Returns the index of the auto-increment field that generators honor.
    ///
    /// Only the first flagged field counts.
    #[must_use]
    pub fn auto_increment_index(&self) -> Option<usize> {
        self.fields.iter().position(|f| f.auto_increment)
    }

    /// Returns dialect-independent generation warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<DdlWarning> {
        let mut warnings = Vec::new();

        if self.fields.is_empty() {
            warnings.push(DdlWarning::EmptyTable {
                table: self.table_name.clone(),
            });
        }

        let honored = self.auto_increment_index();
        for (index, field) in self.fields.iter().enumerate() {
            if Some(index) == honored && field.nullable {
                warnings.push(DdlWarning::NullableAutoIncrement {
                    table: self.table_name.clone(),
                    field: field.name.clone(),
                });
            }
            if field.auto_increment && Some(index) != honored {
                warnings.push(DdlWarning::DuplicateAutoIncrement {
                    table: self.table_name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        warnings
    }

    /// Checks the invariants a migration must satisfy before it can run.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is blank.
    pub fn validate(&self) -> Result<(), InvalidMigration> {
        if self.table_name.trim().is_empty() {
            return Err(InvalidMigration::EmptyTableName);
        }
        Ok(())
    }
}

/// Validates every migration of a batch and rejects duplicate table names.
///
/// # Errors
///
/// Returns the first invariant violation found, in batch order.
pub fn validate_batch(migrations: &[Migration]) -> Result<(), InvalidMigration> {
    let mut seen = HashSet::new();
    for migration in migrations {
        migration.validate()?;
        if !seen.insert(migration.table_name.as_str()) {
            return Err(InvalidMigration::DuplicateTableName(
                migration.table_name.clone(),
            ));
        }
    }
    Ok(())
}

/// A migration that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMigration {
    /// The table name is empty or whitespace.
    EmptyTableName,
    /// Two migrations in one batch target the same table.
    DuplicateTableName(String),
}

impl fmt::Display for InvalidMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTableName => write!(f, "migration table name must not be empty"),
            Self::DuplicateTableName(name) => {
                write!(f, "table '{name}' appears more than once in the batch")
            }
        }
    }
}

impl std::error::Error for InvalidMigration {}

/// A non-fatal problem found while generating DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlWarning {
    /// The migration declares no fields; the generated body is empty.
    EmptyTable {
        /// Table name.
        table: String,
    },
    /// A second auto-increment field was declared and is rendered without
    /// the auto-increment token.
    DuplicateAutoIncrement {
        /// Table name.
        table: String,
        /// Ignored field.
        field: String,
    },
    /// The auto-increment field was declared nullable and is rendered
    /// `NOT NULL`.
    NullableAutoIncrement {
        /// Table name.
        table: String,
        /// Affected field.
        field: String,
    },
    /// The dialect cannot honor auto-increment on this field.
    AutoIncrementIgnored {
        /// Table name.
        table: String,
        /// Ignored field.
        field: String,
        /// Why the dialect dropped the token.
        reason: &'static str,
    },
}

impl fmt::Display for DdlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTable { table } => write!(f, "table '{table}' declares no fields"),
            Self::DuplicateAutoIncrement { table, field } => write!(
                f,
                "table '{table}' declares more than one auto-increment field; '{field}' is not auto-incremented"
            ),
            Self::NullableAutoIncrement { table, field } => write!(
                f,
                "auto-increment field '{table}.{field}' is declared nullable; rendered NOT NULL"
            ),
            Self::AutoIncrementIgnored {
                table,
                field,
                reason,
            } => write!(
                f,
                "auto-increment on '{table}.{field}' ignored: {reason}"
            ),
        }
    }
}

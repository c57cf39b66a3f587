//! Table metadata lookup for query generation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A column declared on a catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogColumn {
    /// Column name.
    pub name: String,
    /// Declared type, e.g. `string` or `bigint`.
    #[serde(rename = "Type")]
    pub column_type: String,
}

impl CatalogColumn {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// Metadata of one catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableMetadata {
    /// Table name.
    pub name: String,
    /// Data columns.
    pub columns: Vec<CatalogColumn>,
    /// Partition key names, in partition value order.
    #[serde(default)]
    pub partition_keys: Vec<String>,
}

impl TableMetadata {
    /// Creates an unpartitioned table.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<CatalogColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            partition_keys: Vec::new(),
        }
    }

    /// Sets the partition keys.
    #[must_use]
    pub fn with_partition_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns true if the table has partition keys.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        !self.partition_keys.is_empty()
    }
}

/// One partition of a table: a value per partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Partition {
    /// Partition values, aligned with the table's partition keys.
    pub values: Vec<String>,
}

/// Catalog of table metadata.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns the metadata of a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableNotFound`] if the table does not exist.
    async fn get_table(&self, database: &str, table: &str) -> Result<TableMetadata>;

    /// Returns every partition of a table.
    async fn get_partitions(&self, database: &str, table: &str) -> Result<Vec<Partition>>;
}

/// In-memory catalog for testing.
///
/// ## Example
///
/// ```rust
/// use purge_jobs::queries::catalog::{CatalogColumn, InMemoryCatalog, TableMetadata};
///
/// let catalog = InMemoryCatalog::new().with_table(
///     "db",
///     TableMetadata::new("people", vec![CatalogColumn::new("customer_id", "string")]),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: HashMap<(String, String), TableMetadata>,
    partitions: HashMap<(String, String), Vec<Partition>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table in `database`.
    #[must_use]
    pub fn with_table(mut self, database: impl Into<String>, table: TableMetadata) -> Self {
        self.tables.insert((database.into(), table.name.clone()), table);
        self
    }

    /// Registers a partition of `database.table`.
    #[must_use]
    pub fn with_partition<I, S>(
        mut self,
        database: impl Into<String>,
        table: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partitions
            .entry((database.into(), table.into()))
            .or_default()
            .push(Partition {
                values: values.into_iter().map(Into::into).collect(),
            });
        self
    }
}

fn key(database: &str, table: &str) -> (String, String) {
    (database.to_string(), table.to_string())
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_table(&self, database: &str, table: &str) -> Result<TableMetadata> {
        self.tables
            .get(&key(database, table))
            .cloned()
            .ok_or_else(|| Error::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            })
    }

    async fn get_partitions(&self, database: &str, table: &str) -> Result<Vec<Partition>> {
        if !self.tables.contains_key(&key(database, table)) {
            return Err(Error::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            });
        }
        Ok(self
            .partitions
            .get(&key(database, table))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_table_is_an_error() {
        let catalog = InMemoryCatalog::new();
        let result = catalog.get_table("db", "missing").await;
        assert!(matches!(result, Err(Error::TableNotFound { .. })));
    }

    #[tokio::test]
    async fn partitions_are_returned_in_registration_order() -> Result<()> {
        let catalog = InMemoryCatalog::new()
            .with_table(
                "db",
                TableMetadata::new("t", vec![CatalogColumn::new("id", "int")])
                    .with_partition_keys(["year", "month"]),
            )
            .with_partition("db", "t", ["2019", "01"])
            .with_partition("db", "t", ["2019", "02"]);

        let table = catalog.get_table("db", "t").await?;
        assert!(table.is_partitioned());
        assert_eq!(table.column("id").map(|c| c.column_type.as_str()), Some("int"));

        let partitions = catalog.get_partitions("db", "t").await?;
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[1].values, vec!["2019", "02"]);
        Ok(())
    }
}

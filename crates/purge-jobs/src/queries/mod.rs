//! Query generation for the find phase.
//!
//! Expands data mappers and the deletion queue into one query descriptor per
//! table partition. Each descriptor lists, per mapped column, the match ids
//! that apply to its data mapper, coerced to the column's declared type.
//!
//! A deletion-queue item applies to a data mapper when it names that mapper,
//! or names no mappers at all. Mappers with no applicable items produce no
//! descriptors.

pub mod catalog;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use catalog::{Catalog, TableMetadata};

/// Location of a data mapper's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutorParameters {
    /// Catalog database.
    pub database: String,
    /// Catalog table.
    pub table: String,
}

/// Maps a logical data set onto catalog columns that hold match ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataMapper {
    /// Unique mapper id.
    pub data_mapper_id: String,
    /// Columns searched for match ids.
    pub columns: Vec<String>,
    /// Table the columns belong to.
    pub query_executor_parameters: QueryExecutorParameters,
}

/// A value to search for: text or integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    /// Integer match.
    Integer(i64),
    /// Text match.
    Text(String),
}

impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for MatchValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for MatchValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// One entry of the deletion queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeletionQueueItem {
    /// The identifier to delete.
    pub match_id: MatchValue,
    /// Data mappers to search; empty means all.
    #[serde(default)]
    pub data_mappers: Vec<String>,
}

impl DeletionQueueItem {
    /// Returns true if this item should be searched for with `data_mapper_id`.
    #[must_use]
    pub fn applies_to(&self, data_mapper_id: &str) -> bool {
        self.data_mappers.is_empty() || self.data_mappers.iter().any(|id| id == data_mapper_id)
    }
}

/// Match ids for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnMatches {
    /// Column name.
    pub column: String,
    /// Coerced match ids.
    pub match_ids: Vec<MatchValue>,
}

/// Value of one partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionValue {
    /// Partition key name.
    pub key: String,
    /// Partition value.
    pub value: String,
}

/// One query to run in the find phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryDescriptor {
    /// Data mapper the query was generated for.
    pub data_mapper_id: String,
    /// Catalog database.
    pub database: String,
    /// Catalog table.
    pub table: String,
    /// Match ids per column.
    pub columns: Vec<ColumnMatches>,
    /// Partition to restrict the query to; absent for unpartitioned tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_keys: Option<Vec<PartitionValue>>,
}

/// Column types match ids can be coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `string` or `varchar`.
    Text,
    /// `int` or `bigint`.
    Integer,
}

impl ColumnType {
    /// Parses a declared catalog type.
    ///
    /// Returns `None` for types match ids cannot be coerced to.
    #[must_use]
    pub fn parse(declared: &str) -> Option<Self> {
        match declared {
            "string" | "varchar" => Some(Self::Text),
            "int" | "bigint" => Some(Self::Integer),
            _ => None,
        }
    }
}

/// Coerces a match id to the declared type of `column` in `table`.
///
/// # Errors
///
/// - [`Error::ColumnNotFound`] if `table` does not declare `column`
/// - [`Error::UnsupportedColumnType`] if the column type is not text or integer
/// - [`Error::InvalidMatchValue`] if an integer column gets a non-integer match
pub fn coerce_match(value: &MatchValue, column: &str, table: &TableMetadata) -> Result<MatchValue> {
    let declared = table.column(column).ok_or_else(|| Error::ColumnNotFound {
        column: column.to_string(),
        table: table.name.clone(),
    })?;

    match ColumnType::parse(&declared.column_type) {
        Some(ColumnType::Text) => Ok(MatchValue::Text(value.to_string())),
        Some(ColumnType::Integer) => match value {
            MatchValue::Integer(number) => Ok(MatchValue::Integer(*number)),
            MatchValue::Text(text) => text.trim().parse().map(MatchValue::Integer).map_err(|_| {
                Error::InvalidMatchValue {
                    column: column.to_string(),
                    value: text.clone(),
                    column_type: declared.column_type.clone(),
                }
            }),
        },
        None => Err(Error::UnsupportedColumnType {
            column: column.to_string(),
            column_type: declared.column_type.clone(),
        }),
    }
}

/// Generates find-phase query descriptors.
#[derive(Clone)]
pub struct QueryGenerator {
    catalog: Arc<dyn Catalog>,
}

impl fmt::Debug for QueryGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryGenerator").finish_non_exhaustive()
    }
}

impl QueryGenerator {
    /// Creates a generator over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Generates descriptors for every data mapper, in mapper order.
    ///
    /// # Errors
    ///
    /// Returns the first catalog or coercion error. Configuration errors are
    /// never skipped.
    #[tracing::instrument(skip_all, fields(data_mappers = data_mappers.len(), queue = deletion_queue.len()))]
    pub async fn generate(
        &self,
        data_mappers: &[DataMapper],
        deletion_queue: &[DeletionQueueItem],
    ) -> Result<Vec<QueryDescriptor>> {
        let mut queries = Vec::new();
        for mapper in data_mappers {
            let applicable: Vec<&MatchValue> = deletion_queue
                .iter()
                .filter(|item| item.applies_to(&mapper.data_mapper_id))
                .map(|item| &item.match_id)
                .collect();
            if applicable.is_empty() {
                debug!(data_mapper = %mapper.data_mapper_id, "no applicable matches");
                continue;
            }

            let generated = self.generate_for_mapper(mapper, &applicable).await?;
            info!(data_mapper = %mapper.data_mapper_id, queries = generated.len(), "generated queries");
            queries.extend(generated);
        }
        Ok(queries)
    }

    async fn generate_for_mapper(
        &self,
        mapper: &DataMapper,
        match_ids: &[&MatchValue],
    ) -> Result<Vec<QueryDescriptor>> {
        let QueryExecutorParameters { database, table } = &mapper.query_executor_parameters;
        let metadata = self.catalog.get_table(database, table).await?;

        let columns = mapper
            .columns
            .iter()
            .map(|column| {
                let match_ids = match_ids
                    .iter()
                    .map(|value| coerce_match(value, column, &metadata))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ColumnMatches {
                    column: column.clone(),
                    match_ids,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let descriptor = |partition_keys: Option<Vec<PartitionValue>>| QueryDescriptor {
            data_mapper_id: mapper.data_mapper_id.clone(),
            database: database.clone(),
            table: table.clone(),
            columns: columns.clone(),
            partition_keys,
        };

        if !metadata.is_partitioned() {
            return Ok(vec![descriptor(None)]);
        }

        let partitions = self.catalog.get_partitions(database, table).await?;
        Ok(partitions
            .into_iter()
            .map(|partition| {
                let keys = metadata
                    .partition_keys
                    .iter()
                    .zip(partition.values)
                    .map(|(key, value)| PartitionValue {
                        key: key.clone(),
                        value,
                    })
                    .collect();
                descriptor(Some(keys))
            })
            .collect())
    }
}

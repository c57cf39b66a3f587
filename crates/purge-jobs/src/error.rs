//! Error types for the deletion-job domain.

use purge_core::JobId;

/// The result type used throughout purge-jobs.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tracking deletion jobs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A change notification carried a record that is neither a job root nor a job event.
    #[error("malformed record: {reason}")]
    MalformedRecord {
        /// Why the record could not be classified.
        reason: String,
    },

    /// A job event referenced a job root that does not exist.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// The job ID that was not found.
        job_id: JobId,
    },

    /// The job root changed between read and conditional write.
    #[error("concurrent modification of job {job_id}: expected version {expected}, found {actual:?}")]
    ConcurrentModification {
        /// The job whose root was modified.
        job_id: JobId,
        /// The version the write was conditioned on.
        expected: u64,
        /// The version found at write time, if the root still exists.
        actual: Option<u64>,
    },

    /// The execution engine failed for a reason other than a duplicate start.
    #[error("execution engine error: {message}")]
    Execution {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A catalog table referenced by a data mapper does not exist.
    #[error("table not found: {database}.{table}")]
    TableNotFound {
        /// The catalog database.
        database: String,
        /// The table name.
        table: String,
    },

    /// A data mapper column is not declared on its table.
    #[error("column {column} not found in table {table}")]
    ColumnNotFound {
        /// The column name.
        column: String,
        /// The table name.
        table: String,
    },

    /// A column is declared with a type that match values cannot be coerced to.
    #[error("column {column} is type {column_type} which is not a supported column type for querying")]
    UnsupportedColumnType {
        /// The column name.
        column: String,
        /// The declared catalog type.
        column_type: String,
    },

    /// A match value could not be coerced to its column's type.
    #[error("match value '{value}' is not valid for column {column} of type {column_type}")]
    InvalidMatchValue {
        /// The column name.
        column: String,
        /// The raw match value.
        value: String,
        /// The declared catalog type.
        column_type: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid runtime configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An error from purge-core.
    #[error("core error: {0}")]
    Core(#[from] purge_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new execution engine error.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new malformed record error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

//! Error types for the load generator.

use thiserror::Error;

/// Errors that can occur while generating load.
#[derive(Debug, Error)]
pub enum LoadError {
	/// A statement or connection-level database failure.
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	/// Settings could not be read or failed validation.
	#[error("Invalid configuration: {0}")]
	Config(String),

	/// The reconnect budget for a worker was exhausted.
	#[error("Gave up after {attempts} reconnect attempts: {source}")]
	RetriesExhausted {
		/// How many connection attempts were made.
		attempts: u32,
		/// The error returned by the final attempt.
		#[source]
		source: sqlx::Error,
	},

	/// A workload needed reference rows that do not exist yet.
	#[error("No {entity} rows available; run seeding first")]
	EmptyReference {
		/// Table the lookup ran against.
		entity: &'static str,
	},
}

impl LoadError {
	/// Whether the error came from the database driver, as opposed to
	/// local configuration or bookkeeping.
	pub fn is_database(&self) -> bool {
		matches!(
			self,
			LoadError::Database(_) | LoadError::RetriesExhausted { .. }
		)
	}
}

/// Result type alias for load-generation operations.
pub type LoadResult<T> = Result<T, LoadError>;

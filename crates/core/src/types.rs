/// Identifier of a single run. Generated per invocation, never reused.
pub type RunId = uuid::Uuid;

/// Identifier of a collected result artifact.
pub type ArtifactId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Job identifiers are millisecond timestamps, made unique per process by
/// [`crate::job::JobIdGenerator`].
pub type JobId = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

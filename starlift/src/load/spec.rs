//! Load specifications: the data half of every loading task.
//!
//! These are build-time, trusted configuration. Table and column names
//! pass the identifier guard when a graph is assembled.

use serde::{Deserialize, Serialize};

/// JSON structure directive for a bulk load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonFormat {
    /// Let the warehouse infer the mapping from attribute names.
    #[default]
    Auto,
    /// Explicit JSON-path mapping file in object storage.
    Path(String),
}

impl std::fmt::Display for JsonFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Path(path) => f.write_str(path),
        }
    }
}

/// Specification for staging raw records into a landing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Target landing table.
    pub table: String,
    /// Object-storage bucket.
    pub bucket: String,
    /// Key (prefix) within the bucket.
    pub key: String,
    /// JSON structure directive.
    #[serde(default)]
    pub json_format: JsonFormat,
    /// Optional time-format hint (for example `epochmillisecs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeformat: Option<String>,
    /// Object-storage region.
    pub region: String,
    /// Clear the landing table before loading. Without it repeated runs
    /// append duplicates, which is accepted pipeline behavior.
    pub truncate: bool,
}

impl StageSpec {
    /// Creates a spec with `auto` JSON inference, the default region, and
    /// truncate-before-load enabled.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            bucket: bucket.into(),
            key: key.into(),
            json_format: JsonFormat::Auto,
            timeformat: None,
            region: "us-east-1".to_owned(),
            truncate: true,
        }
    }

    /// Sets an explicit JSON-path mapping.
    #[must_use]
    pub fn with_json_path(mut self, path: impl Into<String>) -> Self {
        self.json_format = JsonFormat::Path(path.into());
        self
    }

    /// Sets the time-format hint.
    #[must_use]
    pub fn with_timeformat(mut self, format: impl Into<String>) -> Self {
        self.timeformat = Some(format.into());
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Disables the pre-load truncate.
    #[must_use]
    pub fn appending(mut self) -> Self {
        self.truncate = false;
        self
    }

    /// The object-storage path this spec loads from.
    #[must_use]
    pub fn s3_path(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Specification for an append-only fact load.
///
/// There is deliberately no truncate flag here; fact tables accumulate
/// across runs by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSpec {
    /// Target fact table.
    pub table: String,
    /// Column list pinning insert order against the query's projection.
    pub columns: Vec<String>,
    /// Source query producing the rows to append.
    pub query: String,
}

impl FactSpec {
    /// Creates a fact load spec.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            query: query.into(),
        }
    }
}

/// Specification for a dimension load with replace semantics by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Target dimension table.
    pub table: String,
    /// Source query; its column order is trusted to match the table.
    pub query: String,
    /// Truncate before insert. Defaults to true: dimensions are rebuilt
    /// each run.
    pub truncate: bool,
}

impl DimensionSpec {
    /// Creates a dimension spec with replace semantics.
    #[must_use]
    pub fn new(table: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            query: query.into(),
            truncate: true,
        }
    }

    /// Switches to append semantics.
    #[must_use]
    pub fn appending(mut self) -> Self {
        self.truncate = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_spec_defaults() {
        let spec = StageSpec::new("staging_songs", "udacity-dend", "song-data");
        assert_eq!(spec.json_format, JsonFormat::Auto);
        assert_eq!(spec.region, "us-east-1");
        assert!(spec.truncate);
        assert_eq!(spec.s3_path(), "s3://udacity-dend/song-data");
    }

    #[test]
    fn test_stage_spec_builder() {
        let spec = StageSpec::new("staging_events", "udacity-dend", "log-data")
            .with_json_path("s3://udacity-dend/log_json_path.json")
            .with_timeformat("epochmillisecs")
            .with_region("us-west-2")
            .appending();

        assert_eq!(
            spec.json_format,
            JsonFormat::Path("s3://udacity-dend/log_json_path.json".into())
        );
        assert_eq!(spec.timeformat.as_deref(), Some("epochmillisecs"));
        assert_eq!(spec.region, "us-west-2");
        assert!(!spec.truncate);
    }

    #[test]
    fn test_json_format_display() {
        assert_eq!(JsonFormat::Auto.to_string(), "auto");
        assert_eq!(
            JsonFormat::Path("s3://b/p.json".into()).to_string(),
            "s3://b/p.json"
        );
    }

    #[test]
    fn test_dimension_spec_replaces_by_default() {
        let spec = DimensionSpec::new("users", "SELECT 1");
        assert!(spec.truncate);
        assert!(!spec.appending().truncate);
    }
}

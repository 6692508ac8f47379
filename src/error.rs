use std::path::PathBuf;

use thiserror::Error;

/// Every way an export run can fail.
///
/// All variants are fatal for the run: nothing is retried and no partial
/// output file is left behind.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A required input is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The HTTP exchange failed: non-success status, network error, or
    /// timeout. `status` is `None` when no response was received.
    #[error("{}", transport_message(*status, body))]
    Transport { status: Option<u16>, body: String },

    /// The GraphQL service reported query-level errors. `payload` is the raw
    /// JSON of the `errors` array.
    #[error("GraphQL errors: {payload}")]
    Api { payload: String },

    /// The response could not be decoded into the expected shape.
    #[error("unexpected GraphQL response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("project not found: {owner} / #{number}")]
    NotFound { owner: String, number: u32 },

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export cancelled")]
    Cancelled,
}

fn transport_message(status: Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code}: {body}"),
        None => format!("request failed: {body}"),
    }
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;

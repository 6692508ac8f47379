//! Rate-limit detection for failed export runs.
//!
//! GitHub signals rate limits through:
//! - HTTP 403 with "API rate limit exceeded" in the body
//! - HTTP 429 (secondary rate limit)
//! - GraphQL errors of type `RATE_LIMITED` or mentioning "rate limit"

use crate::error::ExportError;

/// Check whether a failure indicates a GitHub rate limit.
pub fn is_rate_limited(error: &ExportError) -> bool {
    match error {
        ExportError::Transport {
            status: Some(403 | 429),
            ..
        } => true,
        ExportError::Transport { body, .. } => mentions_rate_limit(body),
        ExportError::Api { payload } => {
            mentions_rate_limit(payload) || payload.contains("RATE_LIMITED")
        }
        _ => false,
    }
}

fn mentions_rate_limit(text: &str) -> bool {
    text.to_lowercase().contains("rate limit")
}

/// Format a user-facing hint for a rate-limit failure.
pub fn format_rate_limit_message(error: &ExportError) -> String {
    if error.to_string().to_lowercase().contains("secondary rate limit") {
        "Secondary rate limit hit; wait a few minutes before re-running the export".to_owned()
    } else {
        "API rate limit exceeded; re-run the export once the limit resets".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(status: Option<u16>, body: &str) -> ExportError {
        ExportError::Transport {
            status,
            body: body.to_owned(),
        }
    }

    #[test]
    fn detects_403_and_429() {
        assert!(is_rate_limited(&transport(Some(403), "")));
        assert!(is_rate_limited(&transport(Some(429), "")));
    }

    #[test]
    fn detects_rate_limited_graphql_error() {
        let err = ExportError::Api {
            payload: r#"[{"type":"RATE_LIMITED","message":"API rate limit exceeded"}]"#.to_owned(),
        };
        assert!(is_rate_limited(&err));
    }

    #[test]
    fn server_error_is_not_rate_limit() {
        assert!(!is_rate_limited(&transport(Some(502), "Bad Gateway")));
        assert!(!is_rate_limited(&ExportError::Cancelled));
    }

    #[test]
    fn format_secondary_rate_limit() {
        let err = transport(Some(403), "You have exceeded a secondary rate limit");
        assert!(format_rate_limit_message(&err).contains("Secondary rate limit"));
    }

    #[test]
    fn format_primary_rate_limit() {
        let err = transport(Some(403), "API rate limit exceeded for user");
        assert!(format_rate_limit_message(&err).contains("rate limit exceeded"));
    }
}

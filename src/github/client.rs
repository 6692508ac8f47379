use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExportError, Result};

/// Path of the GraphQL endpoint, relative to the API base URI.
const GRAPHQL_ROUTE: &str = "/graphql";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GraphQLPayload<'a, V: Serialize> {
    query: &'a str,
    variables: &'a V,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated GraphQL client for a single endpoint.
///
/// Built on octocrab's raw request API so that the HTTP status and body are
/// available verbatim when a request fails. Octocrab's retry layer is turned
/// off: a failed request surfaces immediately.
#[derive(Clone)]
pub struct GraphQlClient {
    octocrab: Arc<Octocrab>,
}

impl GraphQlClient {
    /// Create a client.
    ///
    /// `api_base` is the REST/GraphQL base URI (e.g. `https://ghe.example.com/api`);
    /// `None` targets `https://api.github.com`. `timeout` bounds every
    /// connect, read and write.
    pub fn new(token: &str, api_base: Option<&str>, timeout: Duration) -> Result<Self> {
        super::install_crypto_provider();

        let mut builder = Octocrab::builder()
            .personal_token(token.to_owned())
            .add_retry_config(RetryConfig::None)
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout))
            .set_write_timeout(Some(timeout));

        if let Some(base) = api_base {
            builder = builder.base_uri(base).map_err(|e| {
                ExportError::Configuration(format!("invalid API URL {base:?}: {e}"))
            })?;
        }

        let octocrab = builder
            .build()
            .map_err(|e| ExportError::Configuration(format!("building GitHub client: {e}")))?;

        Ok(Self {
            octocrab: Arc::new(octocrab),
        })
    }

    /// Execute a query and return the untyped `data` object.
    pub async fn execute_value<V: Serialize>(&self, query: &str, variables: &V) -> Result<Value> {
        let payload = GraphQLPayload { query, variables };

        let response = self
            .octocrab
            ._post(GRAPHQL_ROUTE, Some(&payload))
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let body = self
            .octocrab
            .body_to_string(response)
            .await
            .map_err(transport_failure)?;

        if !status.is_success() {
            tracing::debug!("graphql: HTTP {status}");
            return Err(ExportError::Transport {
                status: Some(status.as_u16()),
                body,
            });
        }

        extract_data(&body)
    }

    /// Execute a query and decode `data` into `D`.
    pub async fn execute<V: Serialize, D: DeserializeOwned>(
        &self,
        query: &str,
        variables: &V,
    ) -> Result<D> {
        let data = self.execute_value(query, variables).await?;
        Ok(serde_json::from_value(data)?)
    }
}

/// Split a successful HTTP body into `data`, failing on any reported errors.
///
/// An `errors` array fails the call even when partial `data` is present.
pub(crate) fn extract_data(body: &str) -> Result<Value> {
    let response: GraphQLResponse = serde_json::from_str(body)?;

    match response.errors {
        None | Some(Value::Null) => {}
        Some(Value::Array(ref errors)) if errors.is_empty() => {}
        Some(errors) => {
            return Err(ExportError::Api {
                payload: errors.to_string(),
            });
        }
    }

    match response.data {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(ExportError::Api {
            payload: "response missing data field".to_owned(),
        }),
    }
}

fn transport_failure(err: octocrab::Error) -> ExportError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    ExportError::Transport {
        status: None,
        body: message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_data_returns_data_object() {
        let data = extract_data(r#"{"data":{"viewer":{"login":"octo"}}}"#).unwrap();
        assert_eq!(data["viewer"]["login"], "octo");
    }

    #[test]
    fn extract_data_fails_on_errors_even_with_data() {
        let body = r#"{"data":{"viewer":null},"errors":[{"message":"Something went wrong","type":"INTERNAL"}]}"#;
        let err = extract_data(body).unwrap_err();
        match err {
            ExportError::Api { payload } => {
                assert!(payload.contains("Something went wrong"));
                assert!(payload.contains("INTERNAL"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn extract_data_ignores_empty_errors_array() {
        let data = extract_data(r#"{"data":{"ok":true},"errors":[]}"#).unwrap();
        assert_eq!(data["ok"], true);
    }

    #[test]
    fn extract_data_missing_data_is_api_error() {
        let err = extract_data(r#"{"data":null}"#).unwrap_err();
        assert!(matches!(err, ExportError::Api { .. }));
    }

    #[test]
    fn extract_data_invalid_json_is_decode_error() {
        let err = extract_data("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ExportError::Decode(_)));
    }
}

// github module: GraphQL transport, project resolution, item listing

pub mod auth;
pub mod client;
pub mod graphql;
pub mod rate_limit;

pub use client::GraphQlClient;
pub use graphql::{PageOptions, list_items, resolve_project};

/// Install the rustls `CryptoProvider` before any TLS client is constructed.
///
/// rustls 0.23 no longer picks a provider on its own when more than one is
/// compiled in. Installing twice is harmless; the second attempt is ignored.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

// Pedantic: suppress noise for internal crate code.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod flatten;
pub mod github;
pub mod snapshot;
pub mod types;

pub use error::{ExportError, Result};

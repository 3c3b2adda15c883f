// ── Core error types ──
//
// Variant matching and cache bookkeeping failures. Fetch failures are
// never wrapped here: they belong to the registered fetch function and
// travel as the `Err` case of an entry, verbatim.

use thiserror::Error;

/// Failure of a runtime [`Cases`](crate::variant::Cases) dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    /// The active case has no handler and no wildcard was supplied.
    #[error("Unhandled case {type_name}::{tag}")]
    UnhandledCase {
        type_name: &'static str,
        tag: String,
    },
}

/// Errors raised by the resource cache itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cannot derive cache key for resource '{resource}': {message}")]
    Key { resource: String, message: String },

    #[error("No cache entry for resource '{resource}' with key {key}")]
    EntryNotFound { resource: String, key: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of a suspending [`get`](crate::ResourceCache::get).
#[derive(Debug, Error)]
pub enum GetError<E> {
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The fetch settled with an error; the payload is the fetch error itself.
    #[error("Fetch failed: {0}")]
    Fetch(E),
}

impl<E> GetError<E> {
    /// The fetch error, if that is what this is.
    pub fn fetch_error(&self) -> Option<&E> {
        match self {
            Self::Fetch(e) => Some(e),
            Self::Cache(_) => None,
        }
    }
}

//! Tagged variants and a de-duplicating async resource cache.
//!
//! - **[`tagged!`]**: declares a closed set of named cases with optional
//!   payloads, plus a companion tag enum and a [`Tagged`] impl for runtime
//!   dispatch through [`Cases`].
//!
//! - **[`AsyncResult`]**: the `Init` / `Pending` / `Ok` / `Err` states of an
//!   asynchronous request. **[`Maybe`]**: explicit optional values where
//!   only absence is `Nothing`.
//!
//! - **[`ResourceCache`]**: keyed memoization of [`Resource`] fetches.
//!   Concurrent requests for the same key share one fetch; consumers hold a
//!   [`DataHandle`] (`current()` / `changed()` / `suspend()`), and released
//!   entries are evicted after a grace period unless the resource persists.

pub mod async_result;
pub mod cache;
pub mod config;
pub mod error;
pub mod maybe;
pub mod stream;
pub mod variant;

// ── Primary re-exports ──────────────────────────────────────────────
pub use async_result::{AsyncResult, AsyncResultTag};
pub use cache::{CacheStats, Resource, ResourceBuilder, ResourceCache, ResourceId};
pub use config::{CacheConfig, DEFAULT_RELEASE_GRACE};
pub use error::{CacheError, GetError, VariantError};
pub use maybe::{Maybe, MaybeTag};
pub use stream::{DataHandle, DataStream};
pub use variant::{Cases, Tagged};

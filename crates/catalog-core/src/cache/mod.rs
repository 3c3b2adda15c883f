// ── Resource cache ──
//
// `ResourceCache` is the facade; each registered resource gets its own
// `EntryCollection` (DashMap + watch channels) behind a type-erased handle.

mod cleanup;
mod collection;
mod resource;
mod resource_cache;

pub(crate) use collection::EntryCollection;
pub(crate) use collection::StateTx;
pub use resource::{Resource, ResourceBuilder, ResourceId};
pub use resource_cache::{CacheStats, ResourceCache};

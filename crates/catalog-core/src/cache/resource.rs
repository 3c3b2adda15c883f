// ── Resource descriptors ──
//
// A resource pairs a named fetch function with a keying strategy over its
// parameters. Keys are structural: two parameter values that serialize to
// the same JSON (object fields in any order) share a cache entry.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::CacheError;

type FetchFn<P, O, E> = dyn Fn(P) -> BoxFuture<'static, Result<O, E>> + Send + Sync;
type KeyFn<P> = dyn Fn(&P) -> Result<Value, serde_json::Error> + Send + Sync;

/// Unique identity of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId(Uuid);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, registered fetch capability plus its keying strategy.
///
/// `P` are the request parameters, `O` the fetched value and `E` the fetch
/// error. Cloning is cheap and keeps the same identity, so clones address
/// the same cache entries.
pub struct Resource<P, O, E> {
    id: ResourceId,
    name: Arc<str>,
    fetch: Arc<FetchFn<P, O, E>>,
    key: Arc<KeyFn<P>>,
    persist: bool,
}

impl<P, O, E> Resource<P, O, E>
where
    P: Serialize + 'static,
    O: 'static,
    E: 'static,
{
    /// Start describing a resource. Without a custom [`key`](ResourceBuilder::key),
    /// entries are keyed by the structural JSON form of the parameters.
    pub fn builder<F, Fut>(name: impl Into<Arc<str>>, fetch: F) -> ResourceBuilder<P, O, E>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        ResourceBuilder {
            name: name.into(),
            fetch: Arc::new(move |params| fetch(params).boxed()),
            key: Arc::new(|params: &P| serde_json::to_value(params)),
            persist: false,
        }
    }
}

impl<P, O, E> Resource<P, O, E> {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether entries outlive their last subscriber.
    pub fn persist(&self) -> bool {
        self.persist
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn fetch_fn(&self) -> Arc<FetchFn<P, O, E>> {
        Arc::clone(&self.fetch)
    }

    /// Derive the canonical entry key for `params`.
    pub fn key_for(&self, params: &P) -> Result<String, CacheError> {
        let value = (self.key)(params).map_err(|e| CacheError::Key {
            resource: self.name.to_string(),
            message: e.to_string(),
        })?;
        Ok(canonical_json(&value))
    }
}

impl<P, O, E> Clone for Resource<P, O, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            fetch: Arc::clone(&self.fetch),
            key: Arc::clone(&self.key),
            persist: self.persist,
        }
    }
}

impl<P, O, E> fmt::Debug for Resource<P, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`Resource::builder`].
pub struct ResourceBuilder<P, O, E> {
    name: Arc<str>,
    fetch: Arc<FetchFn<P, O, E>>,
    key: Arc<KeyFn<P>>,
    persist: bool,
}

impl<P, O, E> ResourceBuilder<P, O, E>
where
    P: 'static,
    O: 'static,
    E: 'static,
{
    /// Key entries by `key(params)` instead of the parameters themselves.
    ///
    /// Must be value-equal for value-equal parameters; it runs on every
    /// cache access, so keep it cheap.
    #[must_use]
    pub fn key<K, F>(mut self, key: F) -> Self
    where
        K: Serialize,
        F: Fn(&P) -> K + Send + Sync + 'static,
    {
        self.key = Arc::new(move |params: &P| serde_json::to_value(key(params)));
        self
    }

    /// Keep entries after their last subscriber releases them.
    #[must_use]
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn build(self) -> Resource<P, O, E> {
        Resource {
            id: ResourceId(Uuid::new_v4()),
            name: self.name,
            fetch: self.fetch,
            key: self.key,
            persist: self.persist,
        }
    }
}

/// Compact JSON with object fields sorted, so equal values encode equally.
fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Listing {
        bucket: String,
        prefix: String,
    }

    fn listing() -> Resource<Listing, Vec<String>, String> {
        Resource::builder("bucket-listing", |_: Listing| async { Ok(Vec::new()) }).build()
    }

    #[test]
    fn field_order_does_not_change_the_key() {
        assert_eq!(
            canonical_json(&json!({ "b": 1, "a": { "y": [1, 2], "x": null } })),
            canonical_json(&json!({ "a": { "x": null, "y": [1, 2] }, "b": 1 })),
        );
        assert_eq!(canonical_json(&json!({ "k": "v\"q" })), r#"{"k":"v\"q"}"#);
    }

    #[test]
    fn default_key_is_structural() {
        let resource = listing();
        let a = resource
            .key_for(&Listing { bucket: "b".into(), prefix: "p/".into() })
            .unwrap();
        let b = resource
            .key_for(&Listing { bucket: "b".into(), prefix: "p/".into() })
            .unwrap();
        let c = resource
            .key_for(&Listing { bucket: "b".into(), prefix: "q/".into() })
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn custom_key_can_ignore_fields() {
        let resource = Resource::builder("by-bucket", |_: Listing| async {
            Ok::<_, String>(0_u32)
        })
        .key(|params: &Listing| params.bucket.clone())
        .build();

        let a = resource
            .key_for(&Listing { bucket: "b".into(), prefix: "p/".into() })
            .unwrap();
        let b = resource
            .key_for(&Listing { bucket: "b".into(), prefix: "q/".into() })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#""b""#);
    }

    #[test]
    fn unserializable_params_fail_key_derivation() {
        let resource = Resource::builder("tuple-keys", |_: HashMap<(u8, u8), u8>| async {
            Ok::<_, String>(())
        })
        .build();

        let err = resource.key_for(&HashMap::from([((1, 2), 3)])).unwrap_err();
        assert!(matches!(err, CacheError::Key { ref resource, .. } if resource == "tuple-keys"));
    }

    #[test]
    fn clones_share_identity() {
        let a = listing();
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), listing().id());
        assert!(!a.persist());
    }
}

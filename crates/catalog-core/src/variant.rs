// ── Tagged variants ──
//
// Closed sum types with a named tag per case. The `tagged!` macro declares
// the enum itself, a fieldless companion tag enum, and the `Tagged` impl
// that ties the two together. Static code matches with a native `match`;
// `Cases` covers handler tables that are assembled at runtime.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::VariantError;

/// A value carrying exactly one case out of a fixed, declared set.
pub trait Tagged {
    /// Fieldless enum naming every declared case.
    type Tag: Copy + Eq + Hash + fmt::Debug + fmt::Display + 'static;

    /// Name of the declaring type, used in diagnostics.
    const TYPE_NAME: &'static str;

    /// Every declared tag, in declaration order.
    const TAGS: &'static [Self::Tag];

    /// The tag of the active case.
    fn tag(&self) -> Self::Tag;

    /// Whether the active case is `tag`.
    fn is(&self, tag: Self::Tag) -> bool {
        self.tag() == tag
    }
}

/// Declare a tagged enum together with its tag enum.
///
/// Each case holds zero or one payload; cases carrying several values use a
/// tuple payload. Duplicate or undeclared case names fail to compile.
///
/// ```
/// catalog_core::tagged! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub enum FilesAction / FilesActionTag {
///         Add((String, u64)),
///         Delete(String),
///         Reset,
///     }
/// }
///
/// use catalog_core::Tagged;
///
/// let action = FilesAction::Delete("data/raw.csv".into());
/// assert_eq!(action.tag(), FilesActionTag::Delete);
/// assert_eq!(FilesActionTag::Reset.to_string(), "Reset");
/// assert_eq!(FilesAction::TAGS.len(), 3);
/// ```
#[macro_export]
macro_rules! tagged {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident $(< $($gen:ident),+ $(,)? >)? / $tag:ident {
            $(
                $(#[$case_meta:meta])*
                $case:ident $( ( $payload:ty ) )?
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name $(< $($gen),+ >)? {
            $(
                $(#[$case_meta])*
                $case $( ( $payload ) )?,
            )+
        }

        #[doc = concat!("Case tags of [`", stringify!($name), "`].")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $tag {
            $( $case, )+
        }

        impl $tag {
            /// The declared case name.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$case => stringify!($case), )+
                }
            }
        }

        impl ::core::fmt::Display for $tag {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl $(< $($gen),+ >)? $crate::variant::Tagged for $name $(< $($gen),+ >)? {
            type Tag = $tag;

            const TYPE_NAME: &'static str = stringify!($name);
            const TAGS: &'static [$tag] = &[ $( $tag::$case, )+ ];

            fn tag(&self) -> $tag {
                match self {
                    $( Self::$case { .. } => $tag::$case, )+
                }
            }
        }
    };
}

type Handler<'a, V, Out> = Box<dyn Fn(&V) -> Out + 'a>;

/// Runtime handler table keyed by case tag.
///
/// Mirrors a `match` whose arms are only known at runtime. A lookup for a
/// tag with no handler falls back to the wildcard set via
/// [`otherwise`](Self::otherwise); without one, [`run`](Self::run) fails
/// with [`VariantError::UnhandledCase`].
pub struct Cases<'a, V: Tagged, Out> {
    handlers: HashMap<V::Tag, Handler<'a, V, Out>>,
    wildcard: Option<Handler<'a, V, Out>>,
}

impl<'a, V: Tagged, Out> Cases<'a, V, Out> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            wildcard: None,
        }
    }

    /// Register the handler for `tag`, replacing any previous one.
    #[must_use]
    pub fn on(mut self, tag: V::Tag, handler: impl Fn(&V) -> Out + 'a) -> Self {
        self.handlers.insert(tag, Box::new(handler));
        self
    }

    /// Register the wildcard handler for every case without its own.
    #[must_use]
    pub fn otherwise(mut self, handler: impl Fn(&V) -> Out + 'a) -> Self {
        self.wildcard = Some(Box::new(handler));
        self
    }

    /// Invoke the handler for the active case of `value`.
    pub fn run(&self, value: &V) -> Result<Out, VariantError> {
        self.try_run(value)
            .ok_or_else(|| VariantError::UnhandledCase {
                type_name: V::TYPE_NAME,
                tag: value.tag().to_string(),
            })
    }

    /// Like [`run`](Self::run), but yields `None` instead of an error when
    /// no handler applies.
    pub fn try_run(&self, value: &V) -> Option<Out> {
        self.handlers
            .get(&value.tag())
            .or(self.wildcard.as_ref())
            .map(|handler| handler(value))
    }

    /// Declared tags that have no dedicated handler.
    pub fn missing(&self) -> Vec<V::Tag> {
        V::TAGS
            .iter()
            .copied()
            .filter(|tag| !self.handlers.contains_key(tag))
            .collect()
    }

    /// Whether every case is covered, by its own handler or the wildcard.
    pub fn is_exhaustive(&self) -> bool {
        self.wildcard.is_some() || self.missing().is_empty()
    }
}

impl<V: Tagged, Out> Default for Cases<'_, V, Out> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    crate::tagged! {
        #[derive(Debug, Clone, PartialEq)]
        enum ObjectExistence / ObjectExistenceTag {
            Exists((String, Option<String>)),
            DoesNotExist,
            Unknown(u16),
        }
    }

    fn exists() -> ObjectExistence {
        ObjectExistence::Exists(("v1".into(), Some("abc".into())))
    }

    #[test]
    fn tag_follows_active_case() {
        assert_eq!(exists().tag(), ObjectExistenceTag::Exists);
        assert_eq!(
            ObjectExistence::DoesNotExist.tag(),
            ObjectExistenceTag::DoesNotExist
        );
        assert!(ObjectExistence::Unknown(503).is(ObjectExistenceTag::Unknown));
        assert!(!ObjectExistence::Unknown(503).is(ObjectExistenceTag::Exists));
    }

    #[test]
    fn tags_keep_declaration_order() {
        assert_eq!(
            ObjectExistence::TAGS,
            &[
                ObjectExistenceTag::Exists,
                ObjectExistenceTag::DoesNotExist,
                ObjectExistenceTag::Unknown,
            ]
        );
        assert_eq!(ObjectExistence::TYPE_NAME, "ObjectExistence");
        assert_eq!(ObjectExistenceTag::DoesNotExist.to_string(), "DoesNotExist");
    }

    #[test]
    fn run_invokes_only_the_matching_handler() {
        let cases = Cases::new()
            .on(ObjectExistenceTag::Exists, |v| match v {
                ObjectExistence::Exists((version, _)) => format!("exists@{version}"),
                _ => String::new(),
            })
            .on(ObjectExistenceTag::DoesNotExist, |_| "missing".to_owned())
            .on(ObjectExistenceTag::Unknown, |_| "unknown".to_owned());

        assert!(cases.is_exhaustive());
        assert_eq!(cases.run(&exists()).unwrap(), "exists@v1");
        assert_eq!(cases.run(&ObjectExistence::DoesNotExist).unwrap(), "missing");
    }

    #[test]
    fn missing_handler_is_an_unhandled_case() {
        let cases: Cases<'_, ObjectExistence, u8> =
            Cases::new().on(ObjectExistenceTag::DoesNotExist, |_| 0);

        let err = cases.run(&ObjectExistence::Unknown(500)).unwrap_err();
        assert_eq!(
            err,
            VariantError::UnhandledCase {
                type_name: "ObjectExistence",
                tag: "Unknown".into(),
            }
        );
        assert_eq!(
            cases.missing(),
            vec![ObjectExistenceTag::Exists, ObjectExistenceTag::Unknown]
        );
        assert!(!cases.is_exhaustive());
    }

    #[test]
    fn wildcard_catches_unlisted_cases() {
        let cases = Cases::new()
            .on(ObjectExistenceTag::Exists, |_| "exists")
            .otherwise(|_| "other");

        assert!(cases.is_exhaustive());
        assert_eq!(cases.run(&exists()).unwrap(), "exists");
        assert_eq!(cases.run(&ObjectExistence::Unknown(404)).unwrap(), "other");
    }

    #[test]
    fn try_run_returns_sentinel_without_handler() {
        let cases = Cases::new().on(ObjectExistenceTag::Unknown, |v| match v {
            ObjectExistence::Unknown(code) => *code,
            _ => 0,
        });

        assert_eq!(cases.try_run(&ObjectExistence::Unknown(418)), Some(418));
        assert_eq!(cases.try_run(&ObjectExistence::DoesNotExist), None);
    }
}

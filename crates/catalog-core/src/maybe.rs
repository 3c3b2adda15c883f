// ── Maybe ──
//
// Explicit optional values. `Nothing` is reserved for absence; falsy
// payloads (`0`, `false`, `""`) are still `Just`.

use serde_json::Value;

crate::tagged! {
    /// An explicitly optional value.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub enum Maybe<T> / MaybeTag {
        Nothing,
        Just(T),
    }
}

impl<T> Maybe<T> {
    pub fn is_just(&self) -> bool {
        matches!(self, Self::Just(_))
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    /// The payload of `Just`, if present.
    pub fn just(&self) -> Option<&T> {
        match self {
            Self::Just(value) => Some(value),
            Self::Nothing => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Maybe<U> {
        match self {
            Self::Just(value) => Maybe::Just(f(value)),
            Self::Nothing => Maybe::Nothing,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Just(value) => value,
            Self::Nothing => default,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Just(value) => Some(value),
            Self::Nothing => None,
        }
    }
}

impl Maybe<Value> {
    /// Coerce a nullable JSON value. Only `null` becomes `Nothing`.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Nothing,
            other => Self::Just(other),
        }
    }
}

impl<T> From<Option<T>> for Maybe<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nothing, Self::Just)
    }
}

impl<T> Default for Maybe<T> {
    fn default() -> Self {
        Self::Nothing
    }
}

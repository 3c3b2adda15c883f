// ── AsyncResult ──
//
// The four states of an asynchronous request, as observed by consumers.

use serde_json::Value;

crate::tagged! {
    /// State of an asynchronous operation.
    ///
    /// Transitions run `Init → Pending → (Ok | Err)`; a re-fetch re-enters
    /// `Pending` from a settled state, carrying the previous value along.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AsyncResult<T, E> / AsyncResultTag {
        /// Nothing requested yet.
        Init,
        /// Request in flight, with the last known value if there is one.
        Pending(Option<T>),
        /// Settled successfully.
        Ok(T),
        /// Settled with an error.
        Err(E),
    }
}

impl<T, E> AsyncResult<T, E> {
    pub fn is_init(&self) -> bool {
        matches!(self, Self::Init)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// `Ok` or `Err`.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ok(_) | Self::Err(_))
    }

    /// The `Ok` payload, if that is the active case.
    pub fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }

    /// The `Err` payload, if that is the active case.
    pub fn err(&self) -> Option<&E> {
        match self {
            Self::Err(err) => Some(err),
            _ => None,
        }
    }

    /// The most recent value: the `Ok` payload, or the value a `Pending`
    /// state carries over from before the re-fetch.
    pub fn previous(&self) -> Option<&T> {
        match self {
            Self::Ok(value) | Self::Pending(Some(value)) => Some(value),
            _ => None,
        }
    }

    pub fn into_previous(self) -> Option<T> {
        match self {
            Self::Ok(value) | Self::Pending(Some(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> AsyncResult<&T, &E> {
        match self {
            Self::Init => AsyncResult::Init,
            Self::Pending(previous) => AsyncResult::Pending(previous.as_ref()),
            Self::Ok(value) => AsyncResult::Ok(value),
            Self::Err(err) => AsyncResult::Err(err),
        }
    }

    /// Map the value, including a value carried by `Pending`.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AsyncResult<U, E> {
        match self {
            Self::Init => AsyncResult::Init,
            Self::Pending(previous) => AsyncResult::Pending(previous.map(f)),
            Self::Ok(value) => AsyncResult::Ok(f(value)),
            Self::Err(err) => AsyncResult::Err(err),
        }
    }

    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> AsyncResult<T, F> {
        match self {
            Self::Init => AsyncResult::Init,
            Self::Pending(previous) => AsyncResult::Pending(previous),
            Self::Ok(value) => AsyncResult::Ok(value),
            Self::Err(err) => AsyncResult::Err(f(err)),
        }
    }

    /// Project part of the value without consuming the result.
    pub fn project<U>(&self, f: impl FnOnce(&T) -> U) -> AsyncResult<U, E>
    where
        E: Clone,
    {
        match self {
            Self::Init => AsyncResult::Init,
            Self::Pending(previous) => AsyncResult::Pending(previous.as_ref().map(f)),
            Self::Ok(value) => AsyncResult::Ok(f(value)),
            Self::Err(err) => AsyncResult::Err(err.clone()),
        }
    }

    /// The outcome once settled; `None` while `Init` or `Pending`.
    pub fn settled(self) -> Option<Result<T, E>> {
        match self {
            Self::Ok(value) => Some(Ok(value)),
            Self::Err(err) => Some(Err(err)),
            Self::Init | Self::Pending(_) => None,
        }
    }
}

impl<E: Clone> AsyncResult<Value, E> {
    /// Project the field `name` out of an `Ok` object.
    ///
    /// Only `Ok` is touched (a missing field yields `Value::Null`); every
    /// other case is returned as-is, partial `Pending` payload included.
    pub fn prop(&self, name: &str) -> Self {
        match self {
            Self::Ok(value) => Self::Ok(value.get(name).cloned().unwrap_or(Value::Null)),
            other => other.clone(),
        }
    }

    /// One [`prop`](Self::prop) projection per name, in order.
    pub fn props(&self, names: &[&str]) -> Vec<Self> {
        names.iter().map(|name| self.prop(name)).collect()
    }
}

impl<T, E> Default for AsyncResult<T, E> {
    fn default() -> Self {
        Self::Init
    }
}

impl<T, E> From<Result<T, E>> for AsyncResult<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) => Self::Err(err),
        }
    }
}

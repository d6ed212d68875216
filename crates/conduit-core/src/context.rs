//! Per-request context
//!
//! A [`Context`] is an immutable key/value scope threaded through one request.
//! Every write returns a new context sharing nothing mutable with the old one,
//! so a middleware step can hand a derived context to `next` while keeping its own.
//!
//! Path variables and middleware values live in separate namespaces: a
//! middleware storing `"slug"` never shadows the `{slug}` path variable.

use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Namespace of a context entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Extracted from a `{name}` route segment
    Path,
    /// Injected by middleware or the caller
    Value,
}

/// A stored context value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    /// String value
    Str(String),
    /// Integer value
    Int(i64),
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Str(s) => f.write_str(s),
            ContextValue::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Str(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Str(value.to_string())
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

/// Types a context value can be read as
pub trait FromContextValue: Sized {
    /// Convert the stored value; `key` is only used for error messages
    fn from_context_value(key: &str, value: &ContextValue) -> Result<Self>;
}

impl FromContextValue for String {
    fn from_context_value(_key: &str, value: &ContextValue) -> Result<Self> {
        Ok(value.to_string())
    }
}

macro_rules! impl_from_context_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromContextValue for $ty {
                fn from_context_value(key: &str, value: &ContextValue) -> Result<Self> {
                    let parsed = match value {
                        ContextValue::Int(i) => <$ty>::try_from(*i).ok(),
                        ContextValue::Str(s) => s.parse::<$ty>().ok(),
                    };
                    parsed.ok_or_else(|| {
                        Error::validation(format!("'{key}' must be a valid {}", stringify!($ty)))
                    })
                }
            }
        )*
    };
}

impl_from_context_value_int!(i32, i64, u32, u64, usize);

#[derive(Debug, Clone, Default)]
struct Entries {
    path: HashMap<String, ContextValue>,
    values: HashMap<String, ContextValue>,
}

impl Entries {
    fn scope(&self, scope: Scope) -> &HashMap<String, ContextValue> {
        match scope {
            Scope::Path => &self.path,
            Scope::Value => &self.values,
        }
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut HashMap<String, ContextValue> {
        match scope {
            Scope::Path => &mut self.path,
            Scope::Value => &mut self.values,
        }
    }
}

/// Context attached to each request
#[derive(Debug, Clone)]
pub struct Context {
    request_id: Arc<str>,
    entries: Arc<Entries>,
}

impl Context {
    /// Create an empty context with a fresh request id
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    /// Create an empty context with the given request id
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Arc::from(request_id.into()),
            entries: Arc::new(Entries::default()),
        }
    }

    /// Unique request ID for tracing
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Derive a context with `key` set in the given scope (copy-on-write)
    pub fn with(&self, scope: Scope, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        let mut entries = (*self.entries).clone();
        entries.scope_mut(scope).insert(key.into(), value.into());
        Self {
            request_id: Arc::clone(&self.request_id),
            entries: Arc::new(entries),
        }
    }

    /// Derive a context carrying a middleware value
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.with(Scope::Value, key, value)
    }

    /// Derive a context carrying a path variable
    pub fn with_path_var(&self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.with(Scope::Path, name, value)
    }

    /// Derive a context carrying all given path variables at once
    pub fn with_path_vars<I, K, V>(&self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ContextValue>,
    {
        let mut entries = (*self.entries).clone();
        for (name, value) in vars {
            entries.path.insert(name.into(), value.into());
        }
        Self {
            request_id: Arc::clone(&self.request_id),
            entries: Arc::new(entries),
        }
    }

    /// Raw lookup
    pub fn get(&self, scope: Scope, key: &str) -> Option<&ContextValue> {
        self.entries.scope(scope).get(key)
    }

    /// Read a middleware value typed as `T`
    ///
    /// A missing key is an internal error: the route was wired without the
    /// middleware that provides it.
    pub fn value<T: FromContextValue>(&self, key: &str) -> Result<T> {
        self.read(Scope::Value, key)
    }

    /// Read a path variable typed as `T`
    pub fn path_var<T: FromContextValue>(&self, name: &str) -> Result<T> {
        self.read(Scope::Path, name)
    }

    fn read<T: FromContextValue>(&self, scope: Scope, key: &str) -> Result<T> {
        let value = self
            .get(scope, key)
            .ok_or_else(|| Error::internal(format!("context key '{key}' not found")))?;
        T::from_context_value(key, value)
    }

    /// Number of entries across both scopes
    pub fn len(&self) -> usize {
        self.entries.path.len() + self.entries.values.len()
    }

    /// True when no entries are set
    pub fn is_empty(&self) -> bool {
        self.entries.path.is_empty() && self.entries.values.is_empty()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

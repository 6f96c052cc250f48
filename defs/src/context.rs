use std::collections::BTreeMap;

use crate::errors::ContextError;

/// Accumulating key/value store used to resolve templates.
///
/// Keys are insert-only: once set, a key keeps its value for the rest of the
/// run so that early and late templates agree on shared identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key`. Returns `Ok(true)` when the key is new and `Ok(false)` when
    /// the same value was already present.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, ContextError> {
        let key = key.into();
        let value = value.into();
        match self.values.get(&key) {
            Some(existing) if *existing == value => Ok(false),
            Some(existing) => Err(ContextError::Conflict {
                key,
                existing: existing.clone(),
                attempted: value,
            }),
            None => {
                self.values.insert(key, value);
                Ok(true)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, ContextError>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut ctx = Self::new();
        for (key, value) in pairs {
            ctx.insert(key, value)?;
        }
        Ok(ctx)
    }
}

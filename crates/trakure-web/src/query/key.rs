//! Composite cache keys

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a cached read: a scope naming the endpoint plus its parameters
///
/// Parameters are kept sorted, so the order they are added in does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    scope: Cow<'static, str>,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    /// Key with no parameters
    pub fn new(scope: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scope: scope.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add or replace a parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Endpoint identity
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Value of one parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scope)?;
        for (index, (name, value)) in self.params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{name}={value}")?;
        }
        Ok(())
    }
}

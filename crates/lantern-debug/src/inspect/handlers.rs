//! Extension handlers keyed by runtime type name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;
use tracing::debug;

use crate::value::Value;

/// Children contributed by a handler, appended after an object's fields.
#[derive(Debug, Default)]
pub struct ChildSink {
    entries: Vec<(SmolStr, Value)>,
}

impl ChildSink {
    pub fn push(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) {
        self.entries.push((name.into(), value.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(SmolStr, Value)> {
        self.entries
    }
}

/// Exposes derived, non-field information about a host type.
pub trait ExtensionHandler: Send + Sync {
    fn contribute(&self, value: &Value, children: &mut ChildSink);
}

impl<F> ExtensionHandler for F
where
    F: Fn(&Value, &mut ChildSink) + Send + Sync,
{
    fn contribute(&self, value: &Value, children: &mut ChildSink) {
        self(value, children);
    }
}

/// Handler table owned by a debugging session.
///
/// Trees hold an `Arc` snapshot; registering after a tree was built does not
/// affect that tree.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<SmolStr, Arc<dyn ExtensionHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `type_name`. The last registration wins.
    pub fn register(
        &mut self,
        type_name: impl Into<SmolStr>,
        handler: impl ExtensionHandler + 'static,
    ) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "extension handler registered");
        self.handlers.insert(type_name, Arc::new(handler));
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn ExtensionHandler>> {
        self.handlers.get(type_name)
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("types", &names).finish()
    }
}

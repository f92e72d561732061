use std::sync::Arc;

use parking_lot::RwLock;

use crate::{AttributeValue, Attributes};

/// Slow-changing metadata attached to all telemetry of one page instance.
///
/// The resource is shared: the session recorder and late lookups may add attributes after
/// initialization, and exporters read a snapshot on every flush.
#[derive(Clone, Debug, Default)]
pub struct Resource {
    attributes: Arc<RwLock<Attributes>>,
}

impl Resource {
    /// Creates a resource from the initial attributes.
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes: Arc::new(RwLock::new(attributes)),
        }
    }

    /// Sets a single attribute, replacing a previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.write().insert(key.into(), value.into());
    }

    /// Returns the value of a single attribute.
    pub fn get(&self, key: &str) -> Option<AttributeValue> {
        self.attributes.read().get(key).cloned()
    }

    /// Returns a copy of all attributes.
    pub fn snapshot(&self) -> Attributes {
        self.attributes.read().clone()
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualified name of an XML element or resource type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local_name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

/// Locator for one remote notification item
///
/// Recomputed on every poll; `etag` and `last_modified` are whatever the
/// listing reported and may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub href: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl ItemReference {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            etag: None,
            last_modified: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// One child of a listed collection, as reported by the resource transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChild {
    pub href: String,
    pub resource_types: Vec<QName>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CollectionChild {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            resource_types: Vec::new(),
            etag: None,
            last_modified: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: QName) -> Self {
        self.resource_types.push(resource_type);
        self
    }

    pub fn has_resource_type(&self, resource_type: &QName) -> bool {
        self.resource_types.iter().any(|t| t == resource_type)
    }
}

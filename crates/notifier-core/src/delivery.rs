//! Building blocks shared by message adaptors
//!
//! Template-key derivation, subject lookup and recipient normalization are
//! the same for every channel; adaptors differ in how they address and send
//! the resulting message.

use std::collections::HashMap;

use crate::config::MessageConfig;
use crate::model::QName;

/// Prefix used when a payload namespace has no mapping
pub const DEFAULT_PREFIX: &str = "default";

/// Namespace prefixes every adaptor knows about
const BUILTIN_PREFIXES: &[(&str, &str)] = &[
    ("http://calendarserver.org/ns/", "CSS"),
    ("http://bedework.org/ns/", "BSS"),
    ("http://bedeworkcalserver.org/ns/", "BW"),
    ("urn:ietf:params:xml:ns:caldav", "C"),
    ("DAV:", "DAV"),
];

/// Namespace URI -> prefix mapping used for template keys
#[derive(Debug, Clone)]
pub struct NamespacePrefixes {
    prefixes: HashMap<String, String>,
}

impl NamespacePrefixes {
    /// Built-in prefixes only
    pub fn builtin() -> Self {
        Self {
            prefixes: BUILTIN_PREFIXES
                .iter()
                .map(|(ns, prefix)| (ns.to_string(), prefix.to_string()))
                .collect(),
        }
    }

    /// No prefixes at all; every namespace maps to [`DEFAULT_PREFIX`]
    pub fn empty() -> Self {
        Self {
            prefixes: HashMap::new(),
        }
    }

    /// Built-in prefixes overridden by configured ones
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut prefixes = Self::builtin();
        for (ns, prefix) in overrides {
            prefixes.prefixes.insert(ns.clone(), prefix.clone());
        }
        prefixes
    }

    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(String::as_str)
    }
}

impl Default for NamespacePrefixes {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Template key for a payload element: `prefix-localname`
///
/// Unmapped namespaces use [`DEFAULT_PREFIX`].
pub fn template_key(element: &QName, prefixes: &NamespacePrefixes) -> String {
    let prefix = prefixes
        .prefix_for(&element.namespace)
        .unwrap_or(DEFAULT_PREFIX);
    format!("{}-{}", prefix, element.local_name)
}

/// Strip a channel scheme prefix (case-insensitive), e.g. `mailto:`
///
/// Addresses without one of the schemes are returned trimmed but otherwise
/// unchanged.
pub fn strip_scheme<'a>(address: &'a str, schemes: &[&str]) -> &'a str {
    let trimmed = address.trim();
    for scheme in schemes {
        if trimmed.len() >= scheme.len()
            && trimmed.is_char_boundary(scheme.len())
            && trimmed[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            return trimmed[scheme.len()..].trim();
        }
    }
    trimmed
}

/// Subject and template-key settings of one adaptor
#[derive(Debug, Clone)]
pub struct MessageSettings {
    pub subjects: HashMap<String, String>,
    pub default_subject: String,
    pub prefixes: NamespacePrefixes,
}

impl MessageSettings {
    pub fn from_config(config: &MessageConfig) -> Self {
        Self {
            subjects: config.subjects.clone(),
            default_subject: config.default_subject.clone(),
            prefixes: NamespacePrefixes::with_overrides(&config.namespace_prefixes),
        }
    }

    pub fn template_key(&self, element: &QName) -> String {
        template_key(element, &self.prefixes)
    }

    /// Subject mapped to the template key, else the default subject
    pub fn subject_for(&self, template_key: &str) -> &str {
        self.subjects
            .get(template_key)
            .map(String::as_str)
            .unwrap_or(&self.default_subject)
    }
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self::from_config(&MessageConfig::default())
    }
}

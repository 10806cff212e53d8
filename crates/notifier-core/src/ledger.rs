// # Processor Status Ledger
//
// Per-notification record of delivery outcome for each processor type.
//
// ## Purpose
//
// The ledger travels inside the notification it describes, so a re-fetched
// or reloaded notification carries the outcome of every earlier attempt.
// Adaptors consult their slot before delivering and write it once delivery
// completes; that is what makes delivery idempotent per channel.
//
// ## Rules
//
// - `status_for` never fails: an untouched slot reads as an empty status
// - A slot is processed once it holds a terminal status code
// - A terminal success is never overwritten
// - Each slot has exactly one writer: the adaptor owning that processor type
// - An adaptor may keep sub-slots named `<processor_type>:<detail>` (the SMS
//   adaptor tracks each recipient this way); only the owning adaptor writes them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status code recorded after a successful delivery
pub const STATUS_OK: u16 = 200;

/// Delivery outcome for one processor type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStatus {
    pub processor_type: String,
    #[serde(default)]
    pub dtstamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl ProcessorStatus {
    /// An untouched slot
    pub fn empty(processor_type: impl Into<String>) -> Self {
        Self {
            processor_type: processor_type.into(),
            dtstamp: None,
            status_code: None,
        }
    }

    /// Whether an earlier attempt recorded a terminal outcome
    ///
    /// Adaptors check this before any delivery attempt and skip delivery
    /// when it holds.
    pub fn is_processed(&self) -> bool {
        self.status_code.is_some_and(is_terminal)
    }

    /// Whether the recorded outcome is a success
    pub fn is_success(&self) -> bool {
        self.status_code.is_some_and(|code| (200..300).contains(&code))
    }

    /// HTTP-style status line for the recorded code, e.g. `HTTP/1.1 200 OK`
    pub fn status_line(&self) -> Option<String> {
        self.status_code.map(format_status_line)
    }
}

/// Terminal codes: any 2xx, or a permanent 4xx rejection
fn is_terminal(code: u16) -> bool {
    match code {
        200..=299 => true,
        408 | 429 => false,
        400..=499 => true,
        _ => false,
    }
}

/// Format a status code as an HTTP/1.1 status line
pub fn format_status_line(code: u16) -> String {
    let reason = match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    format!("HTTP/1.1 {} {}", code, reason)
}

/// Parse the code out of an HTTP status line (`HTTP/1.1 200 OK`)
///
/// A bare number is accepted as well.
pub fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    if first.starts_with("HTTP/") {
        parts.next()?.parse().ok()
    } else {
        first.parse().ok()
    }
}

/// Processor type -> delivery outcome, owned by a notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessorLedger {
    entries: BTreeMap<String, ProcessorStatus>,
}

impl ProcessorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status recorded for a processor type, or an empty status
    pub fn status_for(&self, processor_type: &str) -> ProcessorStatus {
        self.entries
            .get(processor_type)
            .cloned()
            .unwrap_or_else(|| ProcessorStatus::empty(processor_type))
    }

    /// Record the outcome of a delivery attempt
    ///
    /// Returns `false` without touching the slot when it already holds a
    /// terminal success.
    pub fn update(&mut self, processor_type: &str, dtstamp: DateTime<Utc>, status_code: u16) -> bool {
        if let Some(existing) = self.entries.get(processor_type) {
            if existing.is_success() {
                tracing::debug!(
                    "Refusing to overwrite terminal status for processor {}",
                    processor_type
                );
                return false;
            }
        }

        self.entries.insert(
            processor_type.to_string(),
            ProcessorStatus {
                processor_type: processor_type.to_string(),
                dtstamp: Some(dtstamp),
                status_code: Some(status_code),
            },
        );
        true
    }

    /// Insert a status read from a serialized notification
    ///
    /// Used by parsers only; a slot that is already present is kept.
    pub fn insert_parsed(&mut self, status: ProcessorStatus) {
        self.entries
            .entry(status.processor_type.clone())
            .or_insert(status);
    }

    /// Fold another ledger into this one
    ///
    /// For each processor type a processed entry wins over an unprocessed
    /// one; between two processed entries the existing one is kept.
    pub fn merge(&mut self, other: &ProcessorLedger) {
        for (processor_type, theirs) in &other.entries {
            match self.entries.get(processor_type) {
                Some(ours) if ours.is_processed() || !theirs.is_processed() => {}
                _ => {
                    self.entries.insert(processor_type.clone(), theirs.clone());
                }
            }
        }
    }

    /// Whether every listed processor type has a terminal outcome
    pub fn all_processed<'a>(&self, processor_types: impl IntoIterator<Item = &'a str>) -> bool {
        processor_types
            .into_iter()
            .all(|pt| self.status_for(pt).is_processed())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessorStatus> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

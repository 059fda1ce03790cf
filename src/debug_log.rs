//! Bounded in-memory record of model API calls.
//!
//! Every request made by a model client is recorded here together with the
//! response body or the error it produced. The log exists for troubleshooting
//! only; recording never changes the outcome of a call.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Number of entries retained by [`DebugLog::new`].
pub const DEBUG_LOG_CAPACITY: usize = 20;

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugLogEntry {
    /// Identifier also carried by transport errors for correlation
    pub request_id: String,
    pub endpoint: String,
    pub request_body: String,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub timestamp: OffsetDateTime,
}

impl DebugLogEntry {
    /// Starts an entry for an outbound request, stamped with the current time.
    pub fn request(
        request_id: impl Into<String>,
        endpoint: impl Into<String>,
        request_body: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            endpoint: endpoint.into(),
            request_body: request_body.into(),
            response_body: None,
            error_message: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn with_response(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

impl fmt::Display for DebugLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());

        writeln!(f, "[{timestamp}] {} ({})", self.endpoint, self.request_id)?;
        writeln!(f, "  request:  {}", pretty_json(&self.request_body))?;
        if let Some(response) = &self.response_body {
            writeln!(f, "  response: {}", pretty_json(response))?;
        }
        if let Some(error) = &self.error_message {
            writeln!(f, "  error:    {error}")?;
        }
        Ok(())
    }
}

/// Re-indents JSON payloads, leaving anything else untouched.
fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| raw.to_string())
}

/// Shared handle to a fixed-capacity ring buffer of [`DebugLogEntry`].
///
/// Cloning the handle shares the buffer. When full, the oldest entry is
/// evicted first.
#[derive(Debug, Clone)]
pub struct DebugLog {
    entries: Arc<Mutex<VecDeque<DebugLogEntry>>>,
    capacity: usize,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugLog {
    /// Creates a log keeping the most recent 20 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEBUG_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an entry, evicting the oldest one if the log is full.
    pub fn record(&self, entry: DebugLogEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Returns a snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<DebugLogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Returns the most recently recorded entry.
    pub fn latest(&self) -> Option<DebugLogEntry> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<DebugLogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize) -> DebugLogEntry {
        DebugLogEntry::request(
            format!("req-{i}"),
            "https://api.openai.com/v1/chat/completions",
            format!(r#"{{"n": {i}}}"#),
        )
    }

    #[test]
    fn test_bounded_to_most_recent_twenty() {
        let log = DebugLog::new();
        for i in 0..25 {
            log.record(entry(i));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 20);
        assert_eq!(entries.first().unwrap().request_id, "req-5");
        assert_eq!(entries.last().unwrap().request_id, "req-24");

        // Oldest first: timestamps never go backwards
        assert!(
            entries
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp)
        );
    }

    #[test]
    fn test_clones_share_the_buffer() {
        let log = DebugLog::new();
        let handle = log.clone();
        handle.record(entry(1));

        assert_eq!(log.len(), 1);
        assert_eq!(log.latest().unwrap().request_id, "req-1");

        log.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_custom_capacity_evicts_oldest() {
        let log = DebugLog::with_capacity(2);
        log.record(entry(1));
        log.record(entry(2));
        log.record(entry(3));

        let ids: Vec<String> = log.entries().into_iter().map(|e| e.request_id).collect();
        assert_eq!(ids, vec!["req-2", "req-3"]);
    }

    #[test]
    fn test_display_includes_response_and_error() {
        let entry = entry(7)
            .with_response(r#"{"ok":true}"#)
            .with_error("HTTP error: status 500");

        let rendered = entry.to_string();
        assert!(rendered.contains("req-7"));
        assert!(rendered.contains("\"ok\": true"));
        assert!(rendered.contains("HTTP error: status 500"));
        assert!(entry.is_error());
    }
}

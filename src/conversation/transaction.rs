//! Request/response correlation for stateless transports.

use std::collections::HashMap;

use tracing::trace;

use super::ConversationId;

/// Default correlation window: five seconds.
pub const DEFAULT_WINDOW_US: i64 = 5_000_000;

/// Matching policy of one protocol family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Largest request-to-response distance that still correlates,
    /// inclusive.
    pub window_us: i64,
    /// Allowed `(request code, response code)` pairs.
    pairs: Vec<(u32, u32)>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_US)
    }
}

impl CallPolicy {
    pub fn new(window_us: i64) -> Self {
        Self {
            window_us,
            pairs: Vec::new(),
        }
    }

    /// Allow each of `responses` to answer `request`.
    pub fn allow(mut self, request: u32, responses: &[u32]) -> Self {
        self.pairs
            .extend(responses.iter().map(|response| (request, *response)));
        self
    }

    /// Whether a message with `code` may belong to a call whose request
    /// had `stored`.
    pub fn compatible(&self, stored: u32, code: u32) -> bool {
        stored == code || self.pairs.contains(&(stored, code))
    }

    pub fn is_request(&self, code: u32) -> bool {
        self.pairs.iter().any(|(request, _)| *request == code)
    }

    pub fn is_response(&self, code: u32) -> bool {
        self.pairs.iter().any(|(_, response)| *response == code)
    }
}

/// Key of a call: protocol family, conversation and transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub family: &'static str,
    pub conversation: ConversationId,
    pub id: u32,
}

/// One request and, once seen, its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    pub request_frame: u64,
    pub response_frame: Option<u64>,
    pub request_code: u32,
    pub response_code: Option<u32>,
    pub responded: bool,
    /// A retransmission of the request has been seen.
    pub duplicate: bool,
    /// Microseconds since the epoch.
    pub request_time: i64,
}

/// Result of [`TransactionMatcher::register_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub record: CallRecord,
    /// This frame retransmits a request first seen in `original_frame`.
    pub duplicate: bool,
    pub original_frame: Option<u64>,
}

/// Result of [`TransactionMatcher::resolve_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Matched {
        record: CallRecord,
        /// Response time minus request time.
        rtt_us: i64,
        /// Same response code already answered this call from another frame.
        duplicate: bool,
    },
    Unmatched,
}

/// Store of call records, kept for the whole session.
#[derive(Debug, Default)]
pub struct TransactionMatcher {
    policies: HashMap<&'static str, CallPolicy>,
    window_override: Option<i64>,
    records: HashMap<CallKey, Vec<CallRecord>>,
}

impl TransactionMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the policy for a protocol family. Families without one use
    /// [`CallPolicy::default`], which only pairs identical codes.
    pub fn register_policy(&mut self, family: &'static str, policy: CallPolicy) {
        self.policies.insert(family, policy);
    }

    /// Replace every family's window, or restore them with `None`.
    pub fn set_window_override(&mut self, window_us: Option<i64>) {
        self.window_override = window_us;
    }

    fn window(&self, policy: Option<&CallPolicy>) -> i64 {
        self.window_override
            .unwrap_or_else(|| policy.map_or(DEFAULT_WINDOW_US, |p| p.window_us))
    }

    /// Index of the most recent record of `key` that `code` at `time` may
    /// belong to.
    fn find(&self, key: &CallKey, code: u32, time: i64) -> Option<usize> {
        let policy = self.policies.get(key.family);
        let window = self.window(policy);
        let records = self.records.get(key)?;
        records.iter().rposition(|record| {
            let compatible = match policy {
                Some(policy) => policy.compatible(record.request_code, code),
                None => record.request_code == code,
            };
            compatible && (time - record.request_time).abs() <= window
        })
    }

    /// Record a request. A request that matches an existing call first seen
    /// in another frame is a duplicate and creates nothing.
    pub fn register_request(&mut self, key: CallKey, code: u32, frame: u64, time: i64) -> RequestOutcome {
        if let Some(index) = self.find(&key, code, time) {
            if let Some(record) = self.records.get_mut(&key).and_then(|r| r.get_mut(index)) {
                let duplicate = record.request_frame != frame;
                if duplicate {
                    record.duplicate = true;
                    trace!(frame, original = record.request_frame, id = key.id, "Duplicate request");
                }
                return RequestOutcome {
                    record: *record,
                    duplicate,
                    original_frame: duplicate.then_some(record.request_frame),
                };
            }
        }

        let record = CallRecord {
            request_frame: frame,
            response_frame: None,
            request_code: code,
            response_code: None,
            responded: false,
            duplicate: false,
            request_time: time,
        };
        self.records.entry(key).or_default().push(record);
        RequestOutcome {
            record,
            duplicate: false,
            original_frame: None,
        }
    }

    /// Match a response to its request and compute the round-trip time.
    pub fn resolve_response(&mut self, key: CallKey, code: u32, frame: u64, time: i64) -> Resolution {
        let Some(index) = self.find(&key, code, time) else {
            trace!(frame, id = key.id, "Unmatched response");
            return Resolution::Unmatched;
        };
        let Some(record) = self.records.get_mut(&key).and_then(|r| r.get_mut(index)) else {
            return Resolution::Unmatched;
        };

        if record.response_frame.is_none() {
            record.response_frame = Some(frame);
        }
        let duplicate = record.response_frame != Some(frame) && record.response_code == Some(code);
        record.response_code = Some(code);
        record.responded = true;

        Resolution::Matched {
            record: *record,
            rtt_us: time - record.request_time,
            duplicate,
        }
    }

    /// Number of call records.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every call. Policies stay installed.
    pub fn reset(&mut self) {
        self.records.clear();
    }
}

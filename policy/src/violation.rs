//! Bounded violation log (component I): a ring buffer of recent denies with
//! broadcast subscription, grounded on the same args-struct-plus-`new`
//! constructor idiom used for audit records elsewhere in this stack.
//!
//! Not persisted: the store lives only as long as the manager that owns it
//! and is dropped wholesale on `reset`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tokio::sync::broadcast;

pub const DEFAULT_VIOLATION_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    Network,
    Read,
    Write,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub timestamp_unix_ms: i64,
    pub kind: ViolationKind,
    pub target: String,
    pub matched_rule: Option<String>,
    pub process_hint: Option<String>,
}

pub struct ViolationArgs {
    pub kind: ViolationKind,
    pub target: String,
    pub matched_rule: Option<String>,
    pub process_hint: Option<String>,
}

impl Violation {
    pub fn new(args: ViolationArgs) -> Self {
        Self {
            timestamp_unix_ms: now_unix_ms(),
            kind: args.kind,
            target: args.target,
            matched_rule: args.matched_rule,
            process_hint: args.process_hint,
        }
    }
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A fixed-capacity ring of the most recent violations, with a broadcast
/// channel subscribers can use to observe new ones as they happen.
pub struct ViolationStore {
    capacity: usize,
    ring: Mutex<VecDeque<Violation>>,
    sender: broadcast::Sender<Violation>,
}

impl ViolationStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            capacity,
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            sender,
        }
    }

    pub fn record(&self, violation: Violation) {
        {
            let mut ring = self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(violation.clone());
        }
        // No subscribers is a normal, not an error, state.
        let _ = self.sender.send(violation);
    }

    pub fn recent(&self) -> Vec<Violation> {
        let ring = self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ring.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Violation> {
        self.sender.subscribe()
    }
}

impl Default for ViolationStore {
    fn default() -> Self {
        Self::new(DEFAULT_VIOLATION_CAPACITY)
    }
}

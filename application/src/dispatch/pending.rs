//! Correlation table for outbound requests.
//!
//! Every outbound request gets a fresh numeric id and a one-shot slot.
//! The reader loop resolves the slot when a response with that id arrives.
//! A cancelled or timed-out call leaves an inert slot behind, so a late
//! response is recognised and dropped instead of being mistaken for an
//! unknown id.

use butlerd_domain::{ErrorObject, RequestId};
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Payload of a response: the raw `result` object or the peer's error.
pub type CallOutcome = Result<Box<RawValue>, ErrorObject>;

/// What happened to a response handed to [`PendingCalls::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A waiting caller received the outcome.
    Delivered,
    /// The caller gave up (cancelled, timed out or dropped).
    Abandoned,
    /// No outstanding request has this id.
    Unknown,
}

enum Slot {
    Waiting(oneshot::Sender<CallOutcome>),
    Inert,
}

struct Table {
    next_id: i64,
    slots: HashMap<i64, Slot>,
}

/// Outstanding requests keyed by id.
pub struct PendingCalls {
    table: Mutex<Table>,
}

/// Caller side of a registered request.
#[derive(Debug)]
pub struct PendingCall {
    id: i64,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl PendingCall {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Wait for the response.
    ///
    /// Returns `None` if the slot was dropped without an answer, which only
    /// happens when the table itself goes away.
    pub async fn outcome(self) -> Option<CallOutcome> {
        self.receiver.await.ok()
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                next_id: 1,
                slots: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and its slot.
    ///
    /// Ids increase monotonically; one still present in the table is skipped.
    pub fn register(&self) -> PendingCall {
        let (sender, receiver) = oneshot::channel();
        let mut table = self.lock();
        let id = loop {
            let candidate = table.next_id;
            table.next_id = table.next_id.wrapping_add(1);
            if !table.slots.contains_key(&candidate) {
                break candidate;
            }
        };
        table.slots.insert(id, Slot::Waiting(sender));
        PendingCall { id, receiver }
    }

    /// Hand `outcome` to the caller waiting on `id` and remove the slot.
    pub fn resolve(&self, id: &RequestId, outcome: CallOutcome) -> Resolution {
        let Some(id) = id.as_number() else {
            return Resolution::Unknown;
        };
        let slot = self.lock().slots.remove(&id);
        match slot {
            None => Resolution::Unknown,
            Some(Slot::Inert) => Resolution::Abandoned,
            Some(Slot::Waiting(sender)) => match sender.send(outcome) {
                Ok(()) => Resolution::Delivered,
                Err(_) => Resolution::Abandoned,
            },
        }
    }

    /// Mark the call as abandoned, keeping the id reserved.
    ///
    /// Returns `false` if the id was already resolved.
    pub fn neutralize(&self, id: i64) -> bool {
        match self.lock().slots.get_mut(&id) {
            Some(slot) => {
                *slot = Slot::Inert;
                true
            }
            None => false,
        }
    }

    /// Forget a call whose request never reached the wire.
    pub fn discard(&self, id: i64) {
        self.lock().slots.remove(&id);
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lock().slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

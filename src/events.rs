use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{Purpose, ReferenceId, StudentRef};

/// all events that can be emitted while collecting fees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // payment events
    PaymentAllocated {
        student: StudentRef,
        reference_id: ReferenceId,
        amount: Money,
        entries: usize,
        timestamp: DateTime<Utc>,
    },
    TermSettled {
        student: StudentRef,
        purpose: Purpose,
        term: u32,
        timestamp: DateTime<Utc>,
    },
    PaymentReplayed {
        student: StudentRef,
        reference_id: ReferenceId,
        timestamp: DateTime<Utc>,
    },
    AllocationRejected {
        student: StudentRef,
        line_index: Option<usize>,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // structure events
    FeeStructureRegistered {
        student: StudentRef,
        total_due: Money,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

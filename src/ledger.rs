use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{EntryId, EntryKind, PaymentMethod, Purpose, ReferenceId, StudentRef};

/// immutable record of one amount applied to one (purpose, term)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub student: StudentRef,
    pub purpose: Purpose,
    pub term_sequence: u32,
    /// always positive; direction comes from `kind`
    pub amount: Money,
    pub kind: EntryKind,
    pub method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
    pub reference_id: ReferenceId,
    /// index of the request line that produced this entry
    pub line_index: usize,
    pub remarks: Option<String>,
}

impl LedgerEntry {
    pub fn payment(
        student: StudentRef,
        purpose: Purpose,
        term_sequence: u32,
        amount: Money,
        method: PaymentMethod,
        timestamp: DateTime<Utc>,
        reference_id: ReferenceId,
        line_index: usize,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            student,
            purpose,
            term_sequence,
            amount,
            kind: EntryKind::Payment,
            method,
            timestamp,
            reference_id,
            line_index,
            remarks: None,
        }
    }

    /// counter-entry for an existing payment; the original stays untouched
    pub fn reversal_of(original: &LedgerEntry, timestamp: DateTime<Utc>, reference_id: ReferenceId) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            kind: EntryKind::Reversal,
            timestamp,
            reference_id,
            remarks: Some(format!("reversal of {}", original.entry_id)),
            ..original.clone()
        }
    }

    pub fn with_remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }

    /// amount with the sign of its kind
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            EntryKind::Payment => self.amount,
            EntryKind::Reversal => -self.amount,
        }
    }
}

/// append-only ledger of one student
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// load persisted entries
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    /// append committed entries; existing entries are never touched
    pub fn append(&mut self, entries: impl IntoIterator<Item = LedgerEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_reference(&self, reference_id: ReferenceId) -> bool {
        self.entries.iter().any(|e| e.reference_id == reference_id)
    }

    /// entries committed under one reference, in commit order
    pub fn entries_for_reference(&self, reference_id: ReferenceId) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.reference_id == reference_id)
            .collect()
    }

    /// signed totals keyed by (purpose, term)
    pub fn paid_by_term(&self) -> BTreeMap<(Purpose, u32), Money> {
        let mut totals = BTreeMap::new();
        for entry in &self.entries {
            *totals
                .entry((entry.purpose, entry.term_sequence))
                .or_insert(Money::ZERO) += entry.signed_amount();
        }
        totals
    }

    pub fn total_paid(&self) -> Money {
        self.entries.iter().map(LedgerEntry::signed_amount).sum()
    }
}

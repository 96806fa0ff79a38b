use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::classifier::classify;
use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::LedgerEntry;
use crate::snapshot::{ComponentSnapshot, StudentFeeSnapshot};
use crate::types::{AutoAllocation, PaymentMethod, PaymentStatus, Purpose, ReferenceId, StudentRef, TermStatus};

/// one line of a payment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLine {
    pub purpose: Purpose,
    /// omitted lines are routed oldest-debt-first
    #[serde(default)]
    pub term_sequence: Option<u32>,
    pub amount: Money,
    pub method: PaymentMethod,
}

impl PaymentLine {
    pub fn new(purpose: Purpose, amount: Money, method: PaymentMethod) -> Self {
        Self {
            purpose,
            term_sequence: None,
            amount,
            method,
        }
    }

    pub fn for_term(mut self, term_sequence: u32) -> Self {
        self.term_sequence = Some(term_sequence);
        self
    }
}

/// transient multi-line payment submitted for one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub student: StudentRef,
    pub lines: Vec<PaymentLine>,
    #[serde(default)]
    pub remarks: Option<String>,
    /// client idempotency key; generated when absent
    #[serde(default)]
    pub reference_id: Option<ReferenceId>,
}

impl PaymentRequest {
    pub fn new(student: impl Into<StudentRef>) -> Self {
        Self {
            student: student.into(),
            lines: Vec::new(),
            remarks: None,
            reference_id: None,
        }
    }

    pub fn line(mut self, line: PaymentLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn reference(mut self, reference_id: ReferenceId) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn total_amount(&self) -> Money {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

/// receipt line for one ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_index: usize,
    pub purpose: Purpose,
    pub term_sequence: u32,
    pub amount: Money,
    pub method: PaymentMethod,
    pub term_balance_after: Money,
}

/// receipt-ready summary of one committed payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    /// assigned by the store when the payment commits
    pub receipt_number: Option<String>,
    pub reference_id: ReferenceId,
    pub student: StudentRef,
    pub timestamp: DateTime<Utc>,
    pub lines: Vec<ReceiptLine>,
    pub total_amount: Money,
    pub cash_total: Money,
    pub online_total: Money,
    pub overall_balance_after: Money,
    pub status_after: PaymentStatus,
    pub remarks: Option<String>,
}

impl ReceiptSummary {
    /// rebuild a receipt from committed entries against the given balances
    pub fn from_entries(entries: &[LedgerEntry], snapshot: &StudentFeeSnapshot) -> Option<Self> {
        let first = entries.first()?;
        let lines = entries
            .iter()
            .map(|entry| ReceiptLine {
                line_index: entry.line_index,
                purpose: entry.purpose,
                term_sequence: entry.term_sequence,
                amount: entry.amount,
                method: entry.method,
                term_balance_after: snapshot
                    .component(entry.purpose)
                    .and_then(|c| c.term(entry.term_sequence))
                    .map(|t| t.balance)
                    .unwrap_or(Money::ZERO),
            })
            .collect();

        Some(Self::assemble(
            first.reference_id,
            first.student.clone(),
            first.timestamp,
            lines,
            snapshot,
            first.remarks.clone(),
        ))
    }

    fn assemble(
        reference_id: ReferenceId,
        student: StudentRef,
        timestamp: DateTime<Utc>,
        lines: Vec<ReceiptLine>,
        snapshot: &StudentFeeSnapshot,
        remarks: Option<String>,
    ) -> Self {
        let by_method = |method: PaymentMethod| -> Money {
            lines
                .iter()
                .filter(|l| l.method == method)
                .map(|l| l.amount)
                .sum()
        };
        let cash_total = by_method(PaymentMethod::Cash);
        let online_total = by_method(PaymentMethod::Online);

        Self {
            receipt_number: None,
            reference_id,
            student,
            timestamp,
            total_amount: cash_total + online_total,
            cash_total,
            online_total,
            lines,
            overall_balance_after: snapshot.overall_balance,
            status_after: classify(snapshot),
            remarks,
        }
    }
}

/// outcome of an accepted payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub entries: Vec<LedgerEntry>,
    pub receipt: ReceiptSummary,
    /// true when an already committed reference was submitted again
    pub replayed: bool,
}

/// validates payment lines against a running copy of a snapshot
#[derive(Debug, Clone)]
pub struct Allocator {
    policy: AutoAllocation,
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(AutoAllocation::default())
    }
}

impl Allocator {
    pub fn new(policy: AutoAllocation) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.auto_allocation)
    }

    /// split a request into ledger entries, all-or-nothing
    #[instrument(skip_all, fields(student = %request.student, lines = request.lines.len()))]
    pub fn allocate(
        &self,
        request: &PaymentRequest,
        snapshot: &StudentFeeSnapshot,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Allocation> {
        let timestamp = time_provider.now();

        match self.plan(request, snapshot, timestamp) {
            Ok((allocation, settled)) => {
                events.emit(Event::PaymentAllocated {
                    student: request.student.clone(),
                    reference_id: allocation.receipt.reference_id,
                    amount: allocation.receipt.total_amount,
                    entries: allocation.entries.len(),
                    timestamp,
                });
                events.extend(settled.into_iter().map(|(purpose, term)| Event::TermSettled {
                    student: request.student.clone(),
                    purpose,
                    term,
                    timestamp,
                }));

                info!(
                    reference_id = %allocation.receipt.reference_id,
                    amount = %allocation.receipt.total_amount,
                    entries = allocation.entries.len(),
                    "payment allocated"
                );
                Ok(allocation)
            }
            Err(err) => {
                warn!(error = %err, "payment rejected");
                events.emit(Event::AllocationRejected {
                    student: request.student.clone(),
                    line_index: err.line_index(),
                    reason: err.to_string(),
                    timestamp,
                });
                Err(err)
            }
        }
    }

    fn plan(
        &self,
        request: &PaymentRequest,
        snapshot: &StudentFeeSnapshot,
        timestamp: DateTime<Utc>,
    ) -> Result<(Allocation, Vec<(Purpose, u32)>)> {
        if request.student != snapshot.student {
            return Err(FeeError::StudentMismatch {
                requested: request.student.clone(),
                snapshot: snapshot.student.clone(),
            });
        }
        if request.lines.is_empty() {
            return Err(FeeError::EmptyPaymentRequest);
        }

        let reference_id = request.reference_id.unwrap_or_else(Uuid::new_v4);
        let mut working = snapshot.clone();
        let mut entries = Vec::new();
        let mut receipt_lines = Vec::new();
        let mut settled = Vec::new();

        for (line_index, line) in request.lines.iter().enumerate() {
            let component = working.component(line.purpose).ok_or(FeeError::UnknownPurpose {
                line_index,
                purpose: line.purpose,
            })?;

            if !line.amount.is_positive() {
                return Err(FeeError::InvalidAmount {
                    line_index,
                    amount: line.amount,
                });
            }

            let targets = self.resolve_targets(line_index, line, component)?;
            for (term, amount) in targets {
                working.record_in_flight(line.purpose, term, amount);
                let after = working
                    .component(line.purpose)
                    .and_then(|c| c.term(term))
                    .map(|t| (t.balance, t.status))
                    .unwrap_or((Money::ZERO, TermStatus::NotApplicable));

                debug!(line_index, purpose = %line.purpose, term, %amount, balance_after = %after.0, "line applied");
                if after.1 == TermStatus::Paid {
                    settled.push((line.purpose, term));
                }

                entries.push(
                    LedgerEntry::payment(
                        request.student.clone(),
                        line.purpose,
                        term,
                        amount,
                        line.method,
                        timestamp,
                        reference_id,
                        line_index,
                    )
                    .with_remarks(request.remarks.clone()),
                );
                receipt_lines.push(ReceiptLine {
                    line_index,
                    purpose: line.purpose,
                    term_sequence: term,
                    amount,
                    method: line.method,
                    term_balance_after: after.0,
                });
            }
        }

        let receipt = ReceiptSummary::assemble(
            reference_id,
            request.student.clone(),
            timestamp,
            receipt_lines,
            &working,
            request.remarks.clone(),
        );

        Ok((
            Allocation {
                entries,
                receipt,
                replayed: false,
            },
            settled,
        ))
    }

    /// (term, amount) pairs a line lands on, checked against running balances
    fn resolve_targets(
        &self,
        line_index: usize,
        line: &PaymentLine,
        component: &ComponentSnapshot,
    ) -> Result<Vec<(u32, Money)>> {
        let last_term = component.terms.last().map(|t| t.sequence_number).unwrap_or(0);

        if let Some(sequence_number) = line.term_sequence {
            let term = component.term(sequence_number).ok_or(FeeError::TermNotFound {
                line_index,
                purpose: line.purpose,
                term: sequence_number,
            })?;
            if line.amount > term.balance {
                return Err(FeeError::OverpaymentAttempt {
                    line_index,
                    purpose: line.purpose,
                    term: sequence_number,
                    requested: line.amount,
                    available: term.balance,
                });
            }
            return Ok(vec![(sequence_number, line.amount)]);
        }

        match self.policy {
            AutoAllocation::EarliestTermOnly => {
                let (term, available) = component
                    .earliest_outstanding()
                    .map(|t| (t.sequence_number, t.balance))
                    .unwrap_or((last_term, Money::ZERO));
                if line.amount > available {
                    return Err(FeeError::OverpaymentAttempt {
                        line_index,
                        purpose: line.purpose,
                        term,
                        requested: line.amount,
                        available,
                    });
                }
                Ok(vec![(term, line.amount)])
            }
            AutoAllocation::OldestDebtFirst => {
                let available = component.balance();
                if line.amount > available {
                    return Err(FeeError::OverpaymentAttempt {
                        line_index,
                        purpose: line.purpose,
                        term: last_term,
                        requested: line.amount,
                        available,
                    });
                }

                let mut remaining = line.amount;
                let mut targets = Vec::new();
                for term in component.terms.iter().filter(|t| t.balance.is_positive()) {
                    let portion = remaining.min(term.balance);
                    targets.push((term.sequence_number, portion));
                    remaining -= portion;
                    if remaining.is_zero() {
                        break;
                    }
                }
                Ok(targets)
            }
        }
    }
}

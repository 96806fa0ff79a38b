use dashmap::DashMap;
use hourglass_rs::SafeTimeProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument, warn};

use crate::allocation::{Allocation, Allocator, PaymentRequest, ReceiptSummary};
use crate::classifier::RosterSummary;
use crate::config::{EngineConfig, FeeStructure};
use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::{Ledger, LedgerEntry};
use crate::snapshot::{SnapshotBuilder, StudentFeeSnapshot};
use crate::types::StudentRef;

/// fee structure and ledger of one student; guarded by one mutex
#[derive(Debug)]
struct StudentAccount {
    structure: FeeStructure,
    ledger: Ledger,
}

/// in-process owner of fee structures and append-only ledgers
///
/// writes for one student are serialized; snapshots are rebuilt on every read
#[derive(Debug)]
pub struct LedgerStore {
    config: EngineConfig,
    allocator: Allocator,
    accounts: DashMap<StudentRef, Arc<Mutex<StudentAccount>>>,
    events: Mutex<EventStore>,
    receipt_counter: AtomicU64,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LedgerStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            allocator: Allocator::from_config(&config),
            config,
            accounts: DashMap::new(),
            events: Mutex::new(EventStore::new()),
            receipt_counter: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// register or update a student's fee structure
    ///
    /// an update is refused when the existing ledger no longer fits it
    #[instrument(skip_all, fields(student = %structure.student))]
    pub fn register_structure(
        &self,
        structure: FeeStructure,
        time_provider: &SafeTimeProvider,
    ) -> Result<StudentFeeSnapshot> {
        structure.validate()?;
        let student = structure.student.clone();

        let account = Arc::clone(
            self.accounts
                .entry(student.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(StudentAccount {
                        structure: structure.clone(),
                        ledger: Ledger::new(),
                    }))
                })
                .value(),
        );

        let snapshot = {
            let mut account = lock(&account, &student)?;
            let snapshot = SnapshotBuilder::from_ledger(&structure, &account.ledger)?;
            account.structure = structure;
            snapshot
        };

        info!(total_due = %snapshot.total_due, "fee structure registered");
        self.emit(Event::FeeStructureRegistered {
            student: student.clone(),
            total_due: snapshot.total_due,
            timestamp: time_provider.now(),
        })?;
        Ok(snapshot)
    }

    /// hydrate a student from persisted configuration and ledger entries
    #[instrument(skip_all, fields(student = %structure.student, entries = entries.len()))]
    pub fn restore(&self, structure: FeeStructure, entries: Vec<LedgerEntry>) -> Result<StudentFeeSnapshot> {
        let student = structure.student.clone();
        if let Some(entry) = entries.iter().find(|e| e.student != student) {
            return Err(FeeError::StudentMismatch {
                requested: entry.student.clone(),
                snapshot: student,
            });
        }

        let ledger = Ledger::from_entries(entries);
        let snapshot = SnapshotBuilder::from_ledger(&structure, &ledger)?;

        match self.accounts.entry(student.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(FeeError::InvalidConfiguration {
                    message: format!("student {} is already loaded", student),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(StudentAccount { structure, ledger })));
            }
        }

        Ok(snapshot)
    }

    /// fresh snapshot of the latest committed state
    pub fn snapshot(&self, student: &StudentRef) -> Result<StudentFeeSnapshot> {
        let account = self.account(student)?;
        let (structure, ledger) = {
            let account = lock(&account, student)?;
            (account.structure.clone(), account.ledger.clone())
        };
        SnapshotBuilder::from_ledger(&structure, &ledger)
    }

    /// committed ledger entries of a student, oldest first
    pub fn entries(&self, student: &StudentRef) -> Result<Vec<LedgerEntry>> {
        let account = self.account(student)?;
        let account = lock(&account, student)?;
        Ok(account.ledger.entries().to_vec())
    }

    /// validate and commit a payment while holding the student's lock
    #[instrument(skip_all, fields(student = %request.student))]
    pub fn submit_payment(
        &self,
        request: &PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Allocation> {
        let account = self.account(&request.student)?;
        let mut events = EventStore::new();

        let result = {
            let mut account = lock(&account, &request.student)?;
            let snapshot = SnapshotBuilder::from_ledger(&account.structure, &account.ledger)?;

            match request.reference_id {
                Some(reference_id) if account.ledger.contains_reference(reference_id) => {
                    let committed: Vec<LedgerEntry> = account
                        .ledger
                        .entries_for_reference(reference_id)
                        .into_iter()
                        .cloned()
                        .collect();
                    if same_lines(request, &committed) {
                        info!(%reference_id, "reference already committed, replaying receipt");
                        events.emit(Event::PaymentReplayed {
                            student: request.student.clone(),
                            reference_id,
                            timestamp: time_provider.now(),
                        });
                        replay(committed, &snapshot, &self.config.receipt_prefix)
                    } else {
                        let err = FeeError::ReferenceConflict { reference_id };
                        warn!(%reference_id, "reference reused for a different payment");
                        events.emit(Event::AllocationRejected {
                            student: request.student.clone(),
                            line_index: None,
                            reason: err.to_string(),
                            timestamp: time_provider.now(),
                        });
                        Err(err)
                    }
                }
                _ => self
                    .allocator
                    .allocate(request, &snapshot, time_provider, &mut events)
                    .map(|mut allocation| {
                        account.ledger.append(allocation.entries.iter().cloned());
                        allocation.receipt.receipt_number = Some(self.next_receipt_number());
                        allocation
                    }),
            }
        };

        for event in events.take_events() {
            self.emit(event)?;
        }
        result
    }

    /// classification and totals over every registered student
    pub fn roster_summary(&self) -> Result<RosterSummary> {
        let mut students = self.students();
        students.sort();

        let mut summary = RosterSummary::new();
        for student in &students {
            summary.add(&self.snapshot(student)?)?;
        }
        Ok(summary)
    }

    pub fn students(&self) -> Vec<StudentRef> {
        self.accounts.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn take_events(&self) -> Result<Vec<Event>> {
        let mut events = self.events.lock().map_err(|_| FeeError::EventLogPoisoned)?;
        Ok(events.take_events())
    }

    fn account(&self, student: &StudentRef) -> Result<Arc<Mutex<StudentAccount>>> {
        self.accounts
            .get(student)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FeeError::MissingFeeStructure {
                student: student.clone(),
            })
    }

    fn next_receipt_number(&self) -> String {
        let number = self.receipt_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{:06}", self.config.receipt_prefix, number)
    }

    fn emit(&self, event: Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| FeeError::EventLogPoisoned)?
            .emit(event);
        Ok(())
    }
}

fn lock<'a>(
    account: &'a Mutex<StudentAccount>,
    student: &StudentRef,
) -> Result<MutexGuard<'a, StudentAccount>> {
    account.lock().map_err(|_| FeeError::LockPoisoned {
        student: student.clone(),
    })
}

/// whether a resubmitted request carries the lines committed under its reference
///
/// a line is compared by purpose, method and total amount; its term only when it named one
fn same_lines(request: &PaymentRequest, committed: &[LedgerEntry]) -> bool {
    let committed_lines = committed.iter().map(|e| e.line_index).max().map_or(0, |i| i + 1);
    if committed_lines != request.lines.len() {
        return false;
    }

    request.lines.iter().enumerate().all(|(line_index, line)| {
        let entries: Vec<&LedgerEntry> = committed.iter().filter(|e| e.line_index == line_index).collect();
        let total: Money = entries.iter().map(|e| e.amount).sum();
        !entries.is_empty()
            && total == line.amount
            && entries
                .iter()
                .all(|e| e.purpose == line.purpose && e.method == line.method)
            && line
                .term_sequence
                .map_or(true, |term| entries.iter().all(|e| e.term_sequence == term))
    })
}

fn replay(entries: Vec<LedgerEntry>, snapshot: &StudentFeeSnapshot, prefix: &str) -> Result<Allocation> {
    let mut receipt =
        ReceiptSummary::from_entries(&entries, snapshot).ok_or(FeeError::EmptyPaymentRequest)?;
    receipt.receipt_number = Some(format!("{}-{}", prefix, receipt.reference_id.simple()));
    Ok(Allocation {
        entries,
        receipt,
        replayed: true,
    })
}

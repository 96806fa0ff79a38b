use thiserror::Error;

use crate::decimal::Money;
use crate::types::{Purpose, ReferenceId, StudentRef};

#[derive(Error, Debug)]
pub enum FeeError {
    #[error("overpayment detected on {purpose} term {term}: paid {paid} exceeds amount {amount}")]
    OverpaymentDetected {
        purpose: Purpose,
        term: u32,
        amount: Money,
        paid: Money,
    },

    #[error("negative paid total on {purpose} term {term}: {paid}")]
    NegativePaid {
        purpose: Purpose,
        term: u32,
        paid: Money,
    },

    #[error("line {line_index}: no {purpose} fee configured for this student")]
    UnknownPurpose {
        line_index: usize,
        purpose: Purpose,
    },

    #[error("line {line_index}: {purpose} has no term {term}")]
    TermNotFound {
        line_index: usize,
        purpose: Purpose,
        term: u32,
    },

    #[error("line {line_index}: {requested} exceeds outstanding {available} on {purpose} term {term}")]
    OverpaymentAttempt {
        line_index: usize,
        purpose: Purpose,
        term: u32,
        requested: Money,
        available: Money,
    },

    #[error("line {line_index}: invalid payment amount {amount}")]
    InvalidAmount {
        line_index: usize,
        amount: Money,
    },

    #[error("payment request has no lines")]
    EmptyPaymentRequest,

    #[error("ledger entry references {purpose} term {term} which is not configured")]
    OrphanLedgerEntry {
        purpose: Purpose,
        term: u32,
    },

    #[error("no fee structure configured for student {student}")]
    MissingFeeStructure {
        student: StudentRef,
    },

    #[error("request for student {requested} submitted against snapshot of {snapshot}")]
    StudentMismatch {
        requested: StudentRef,
        snapshot: StudentRef,
    },

    #[error("student {student} already counted in roster")]
    DuplicateRosterEntry {
        student: StudentRef,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("ledger lock poisoned for student {student}")]
    LockPoisoned {
        student: StudentRef,
    },

    #[error("event log lock poisoned")]
    EventLogPoisoned,

    #[error("reference {reference_id} was already committed with different lines")]
    ReferenceConflict {
        reference_id: ReferenceId,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeeError {
    /// line of the payment request the error points at, if any
    pub fn line_index(&self) -> Option<usize> {
        match self {
            FeeError::UnknownPurpose { line_index, .. }
            | FeeError::TermNotFound { line_index, .. }
            | FeeError::OverpaymentAttempt { line_index, .. }
            | FeeError::InvalidAmount { line_index, .. } => Some(*line_index),
            _ => None,
        }
    }

    /// whether the submitter can correct the request and resubmit
    pub fn is_request_error(&self) -> bool {
        self.line_index().is_some()
            || matches!(
                self,
                FeeError::EmptyPaymentRequest | FeeError::ReferenceConflict { .. }
            )
    }
}

pub type Result<T> = std::result::Result<T, FeeError>;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// groups ledger entries committed by one payment request
pub type ReferenceId = Uuid;

/// identifier of one ledger entry
pub type EntryId = Uuid;

/// student enrollment reference (admission number or enrollment id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentRef(String);

impl StudentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        StudentRef(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentRef {
    fn from(s: &str) -> Self {
        StudentRef::new(s)
    }
}

/// category of a fee or payment line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Purpose {
    Tuition,
    Transport,
    Book,
    Other,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Tuition => "TUITION",
            Purpose::Transport => "TRANSPORT",
            Purpose::Book => "BOOK",
            Purpose::Other => "OTHER",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// how the money was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Online,
}

/// per-term status, derived from amount and paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TermStatus {
    /// balance is zero on a non-zero amount
    Paid,
    /// something paid, something left
    Partial,
    /// nothing paid on a non-zero amount
    Unpaid,
    /// waived or zero-amount term
    NotApplicable,
}

impl TermStatus {
    /// whether the term still carries a balance
    pub fn is_outstanding(&self) -> bool {
        matches!(self, TermStatus::Partial | TermStatus::Unpaid)
    }
}

/// overall status of a student or a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Outstanding,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Partial => "PARTIAL",
            PaymentStatus::Outstanding => "OUTSTANDING",
        };
        f.write_str(label)
    }
}

/// ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// money received against a term
    Payment,
    /// refund or correction, carried as a negative amount
    Reversal,
}

/// policy for lines submitted without a term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutoAllocation {
    /// spread the amount over terms in due order, oldest debt first
    #[default]
    OldestDebtFirst,
    /// target only the earliest term with a balance; amount must fit in it
    EarliestTermOnly,
}

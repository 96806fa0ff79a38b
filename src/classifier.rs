use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::snapshot::{ComponentSnapshot, StudentFeeSnapshot};
use crate::types::{PaymentStatus, StudentRef};

/// the three-way rule shared by students and components
fn status_of(total_paid: Money, balance: Money) -> PaymentStatus {
    if balance.is_zero() {
        PaymentStatus::Paid
    } else if total_paid.is_zero() {
        PaymentStatus::Outstanding
    } else {
        PaymentStatus::Partial
    }
}

/// overall status of one student
pub fn classify(snapshot: &StudentFeeSnapshot) -> PaymentStatus {
    status_of(snapshot.total_paid, snapshot.overall_balance)
}

/// status of a single purpose, e.g. the transport balance panel
pub fn classify_component(component: &ComponentSnapshot) -> PaymentStatus {
    status_of(component.total_paid(), component.balance())
}

/// per-student row of a roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub status: PaymentStatus,
    pub total_paid: Money,
    pub overall_balance: Money,
}

/// incremental roster totals for dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    rows: BTreeMap<StudentRef, RosterRow>,
    pub paid_count: usize,
    pub partial_count: usize,
    pub outstanding_count: usize,
    pub total_collected: Money,
    pub total_outstanding: Money,
}

impl RosterSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a StudentFeeSnapshot>) -> Result<Self> {
        let mut summary = Self::new();
        for snapshot in snapshots {
            summary.add(snapshot)?;
        }
        Ok(summary)
    }

    /// count one more student; earlier rows are never revisited
    pub fn add(&mut self, snapshot: &StudentFeeSnapshot) -> Result<PaymentStatus> {
        if self.rows.contains_key(&snapshot.student) {
            return Err(FeeError::DuplicateRosterEntry {
                student: snapshot.student.clone(),
            });
        }

        let status = classify(snapshot);
        match status {
            PaymentStatus::Paid => self.paid_count += 1,
            PaymentStatus::Partial => self.partial_count += 1,
            PaymentStatus::Outstanding => self.outstanding_count += 1,
        }
        self.total_collected += snapshot.total_paid;
        self.total_outstanding += snapshot.overall_balance;
        self.rows.insert(
            snapshot.student.clone(),
            RosterRow {
                status,
                total_paid: snapshot.total_paid,
                overall_balance: snapshot.overall_balance,
            },
        );

        Ok(status)
    }

    pub fn student_count(&self) -> usize {
        self.rows.len()
    }

    pub fn status_of(&self, student: &StudentRef) -> Option<PaymentStatus> {
        self.rows.get(student).map(|row| row.status)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&StudentRef, &RosterRow)> {
        self.rows.iter()
    }

    /// students still owing money, largest balance first
    pub fn defaulters(&self) -> Vec<(&StudentRef, Money)> {
        let mut owing: Vec<(&StudentRef, Money)> = self
            .rows
            .iter()
            .filter(|(_, row)| row.status != PaymentStatus::Paid)
            .map(|(student, row)| (student, row.overall_balance))
            .collect();
        owing.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        owing
    }

    /// share of billed money already collected, between 0 and 1
    pub fn collection_rate(&self) -> Decimal {
        let billed = self.total_collected + self.total_outstanding;
        if billed.is_zero() {
            return Decimal::ZERO;
        }
        (self.total_collected.as_decimal() / billed.as_decimal()).round_dp(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FeeComponent, SnapshotBuilder, Term};
    use crate::types::Purpose;
    use rust_decimal_macros::dec;

    fn snapshot(student: &str, terms: &[(i64, i64)]) -> StudentFeeSnapshot {
        let terms: Vec<Term> = terms
            .iter()
            .zip(1..)
            .map(|(&(amount, paid), sequence_number)| Term {
                sequence_number,
                amount: Money::from_major(amount),
                paid: Money::from_major(paid),
            })
            .collect();
        let total: Money = terms.iter().map(|t| t.amount).sum();
        let component = FeeComponent {
            purpose: Purpose::Tuition,
            actual_amount: total,
            concession_amount: Money::ZERO,
            terms,
            paid: Money::ZERO,
        };
        SnapshotBuilder::build(&StudentRef::new(student), &[component]).unwrap()
    }

    #[test]
    fn test_classify_three_way_rule() {
        assert_eq!(classify(&snapshot("A", &[(5_000, 5_000), (5_000, 5_000)])), PaymentStatus::Paid);
        assert_eq!(classify(&snapshot("B", &[(5_000, 0), (5_000, 0)])), PaymentStatus::Outstanding);
        assert_eq!(
            classify(&snapshot("C", &[(5_000, 5_000), (5_000, 2_000), (5_000, 0)])),
            PaymentStatus::Partial
        );
    }

    #[test]
    fn test_fully_waived_student_is_paid() {
        assert_eq!(classify(&snapshot("W", &[(0, 0)])), PaymentStatus::Paid);
    }

    #[test]
    fn test_classify_component_per_purpose() {
        let snap = snapshot("C", &[(5_000, 1_000), (5_000, 0)]);
        assert_eq!(classify_component(&snap.components[0]), PaymentStatus::Partial);
    }

    #[test]
    fn test_roster_totals() {
        let snapshots = vec![
            snapshot("A", &[(5_000, 5_000)]),
            snapshot("B", &[(5_000, 0)]),
            snapshot("C", &[(5_000, 2_000), (5_000, 0)]),
        ];

        let summary = RosterSummary::from_snapshots(&snapshots).unwrap();
        assert_eq!(summary.student_count(), 3);
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.partial_count, 1);
        assert_eq!(summary.outstanding_count, 1);
        assert_eq!(summary.total_collected, Money::from_major(7_000));
        assert_eq!(summary.total_outstanding, Money::from_major(13_000));
        assert_eq!(summary.collection_rate(), dec!(0.35));

        let defaulters = summary.defaulters();
        assert_eq!(defaulters[0].0.as_str(), "C");
        assert_eq!(defaulters[1].0.as_str(), "B");
    }

    #[test]
    fn test_adding_students_never_reclassifies_earlier_rows() {
        let mut summary = RosterSummary::new();
        summary.add(&snapshot("A", &[(5_000, 2_000)])).unwrap();
        let before = summary.status_of(&StudentRef::new("A"));

        summary.add(&snapshot("B", &[(100_000, 0)])).unwrap();
        assert_eq!(summary.status_of(&StudentRef::new("A")), before);

        let again = summary.add(&snapshot("A", &[(5_000, 5_000)]));
        assert!(matches!(again, Err(FeeError::DuplicateRosterEntry { .. })));
        assert_eq!(summary.student_count(), 2);
    }

    #[test]
    fn test_empty_roster_collection_rate() {
        assert_eq!(RosterSummary::new().collection_rate(), Decimal::ZERO);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::config::{ComponentConfig, FeeStructure};
use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::ledger::Ledger;
use crate::types::{Purpose, StudentRef, TermStatus};

/// sequence number of the implicit term of a one-shot component
pub const SINGLE_TERM: u32 = 1;

/// raw term input: configured amount and what has been paid against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub sequence_number: u32,
    pub amount: Money,
    pub paid: Money,
}

/// raw component input for the builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeComponent {
    pub purpose: Purpose,
    pub actual_amount: Money,
    pub concession_amount: Money,
    /// empty for one-shot purposes
    pub terms: Vec<Term>,
    /// paid amount of a one-shot component; must be zero when `terms` is set
    pub paid: Money,
}

impl FeeComponent {
    /// component from its configuration with paid amounts looked up per term
    pub fn from_config(config: &ComponentConfig, paid_for: impl Fn(u32) -> Money) -> Self {
        let terms: Vec<Term> = config
            .installments
            .iter()
            .map(|installment| Term {
                sequence_number: installment.sequence_number,
                amount: installment.amount,
                paid: paid_for(installment.sequence_number),
            })
            .collect();
        let paid = if terms.is_empty() {
            paid_for(SINGLE_TERM)
        } else {
            Money::ZERO
        };

        Self {
            purpose: config.purpose,
            actual_amount: config.actual_amount,
            concession_amount: config.concession_amount,
            terms,
            paid,
        }
    }

    pub fn total_amount(&self) -> Money {
        self.actual_amount - self.concession_amount
    }
}

/// derived view of one term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSnapshot {
    pub sequence_number: u32,
    pub amount: Money,
    pub paid: Money,
    pub balance: Money,
    pub status: TermStatus,
}

impl TermSnapshot {
    fn derive(sequence_number: u32, amount: Money, paid: Money) -> Self {
        Self {
            sequence_number,
            amount,
            paid,
            balance: amount.saturating_sub(paid),
            status: term_status(amount, paid),
        }
    }
}

/// status rule for one term; zero-amount terms are never counted as paid
pub fn term_status(amount: Money, paid: Money) -> TermStatus {
    if amount.is_zero() {
        TermStatus::NotApplicable
    } else if paid >= amount {
        TermStatus::Paid
    } else if paid.is_positive() {
        TermStatus::Partial
    } else {
        TermStatus::Unpaid
    }
}

/// derived view of one purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub purpose: Purpose,
    pub actual_amount: Money,
    pub concession_amount: Money,
    pub total_amount: Money,
    /// false for one-shot purposes carried as a single implicit term
    pub multi_term: bool,
    /// ordered by sequence number
    pub terms: Vec<TermSnapshot>,
}

impl ComponentSnapshot {
    pub fn total_paid(&self) -> Money {
        self.terms.iter().map(|t| t.paid).sum()
    }

    pub fn balance(&self) -> Money {
        self.terms.iter().map(|t| t.balance).sum()
    }

    pub fn term(&self, sequence_number: u32) -> Option<&TermSnapshot> {
        self.terms.iter().find(|t| t.sequence_number == sequence_number)
    }

    /// oldest term still carrying a balance
    pub fn earliest_outstanding(&self) -> Option<&TermSnapshot> {
        self.terms.iter().find(|t| t.balance.is_positive())
    }
}

/// point-in-time balances of one student; rebuilt on every read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFeeSnapshot {
    pub student: StudentRef,
    pub components: Vec<ComponentSnapshot>,
    pub total_due: Money,
    pub total_paid: Money,
    pub overall_balance: Money,
}

impl StudentFeeSnapshot {
    pub fn component(&self, purpose: Purpose) -> Option<&ComponentSnapshot> {
        self.components.iter().find(|c| c.purpose == purpose)
    }

    /// outstanding amount of one purpose, e.g. tuition balance by enrollment
    pub fn balance_for(&self, purpose: Purpose) -> Option<Money> {
        self.component(purpose).map(ComponentSnapshot::balance)
    }

    pub fn earliest_outstanding_term(&self, purpose: Purpose) -> Option<&TermSnapshot> {
        self.component(purpose).and_then(ComponentSnapshot::earliest_outstanding)
    }

    /// apply an in-flight amount to the working copy held by the allocator
    pub(crate) fn record_in_flight(&mut self, purpose: Purpose, sequence_number: u32, amount: Money) {
        let Some(term) = self
            .components
            .iter_mut()
            .find(|c| c.purpose == purpose)
            .and_then(|c| c.terms.iter_mut().find(|t| t.sequence_number == sequence_number))
        else {
            return;
        };

        *term = TermSnapshot::derive(sequence_number, term.amount, term.paid + amount);
        self.refresh_totals();
    }

    fn refresh_totals(&mut self) {
        self.total_due = self.components.iter().map(|c| c.total_amount).sum();
        self.total_paid = self.components.iter().map(ComponentSnapshot::total_paid).sum();
        self.overall_balance = self.components.iter().map(ComponentSnapshot::balance).sum();
    }
}

/// builds snapshots from raw components or from a ledger
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// derive balances and statuses for one student
    pub fn build(student: &StudentRef, components: &[FeeComponent]) -> Result<StudentFeeSnapshot> {
        if components.is_empty() {
            return Err(FeeError::MissingFeeStructure {
                student: student.clone(),
            });
        }

        let mut purposes = BTreeSet::new();
        let mut snapshots = Vec::with_capacity(components.len());
        for component in components {
            if !purposes.insert(component.purpose) {
                return Err(FeeError::InvalidConfiguration {
                    message: format!("{} configured twice for {}", component.purpose, student),
                });
            }
            snapshots.push(Self::build_component(student, component)?);
        }

        let mut snapshot = StudentFeeSnapshot {
            student: student.clone(),
            components: snapshots,
            total_due: Money::ZERO,
            total_paid: Money::ZERO,
            overall_balance: Money::ZERO,
        };
        snapshot.refresh_totals();
        Ok(snapshot)
    }

    /// project a fee structure and its ledger into a snapshot
    pub fn from_ledger(structure: &FeeStructure, ledger: &Ledger) -> Result<StudentFeeSnapshot> {
        structure.validate()?;

        let paid = ledger.paid_by_term();
        for &(purpose, term) in paid.keys() {
            let configured = structure.component(purpose).is_some_and(|c| {
                if c.is_multi_term() {
                    c.installments.iter().any(|i| i.sequence_number == term)
                } else {
                    term == SINGLE_TERM
                }
            });
            if !configured {
                return Err(FeeError::OrphanLedgerEntry { purpose, term });
            }
        }

        let components: Vec<FeeComponent> = structure
            .components
            .iter()
            .map(|config| {
                FeeComponent::from_config(config, |term| {
                    paid.get(&(config.purpose, term)).copied().unwrap_or(Money::ZERO)
                })
            })
            .collect();

        Self::build(&structure.student, &components)
    }

    fn build_component(student: &StudentRef, component: &FeeComponent) -> Result<ComponentSnapshot> {
        let purpose = component.purpose;
        if component.actual_amount.is_negative()
            || component.concession_amount.is_negative()
            || component.concession_amount > component.actual_amount
        {
            return Err(FeeError::InvalidConfiguration {
                message: format!(
                    "{}: concession {} must be between 0 and actual amount {}",
                    purpose, component.concession_amount, component.actual_amount
                ),
            });
        }

        let multi_term = !component.terms.is_empty();
        if multi_term && !component.paid.is_zero() {
            return Err(FeeError::InvalidConfiguration {
                message: format!(
                    "{}: component paid {} must be zero when paid is tracked per term",
                    purpose, component.paid
                ),
            });
        }
        let mut raw: Vec<(u32, Money, Money)> = if multi_term {
            component
                .terms
                .iter()
                .map(|t| (t.sequence_number, t.amount, t.paid))
                .collect()
        } else {
            vec![(SINGLE_TERM, component.total_amount(), component.paid)]
        };
        raw.sort_by_key(|&(sequence_number, _, _)| sequence_number);

        if raw.iter().any(|&(sequence_number, _, _)| sequence_number == 0)
            || raw.windows(2).any(|w| w[0].0 == w[1].0)
        {
            return Err(FeeError::InvalidConfiguration {
                message: format!("{}: term sequence numbers must be positive and unique", purpose),
            });
        }

        let scheduled: Money = raw.iter().map(|&(_, amount, _)| amount).sum();
        if scheduled != component.total_amount() {
            return Err(FeeError::InvalidConfiguration {
                message: format!(
                    "{}: terms sum to {} but actual minus concession is {}",
                    purpose,
                    scheduled,
                    component.total_amount()
                ),
            });
        }

        let mut terms = Vec::with_capacity(raw.len());
        for (sequence_number, amount, paid) in raw {
            if amount.is_negative() {
                return Err(FeeError::InvalidConfiguration {
                    message: format!("{}: term {} amount {} is negative", purpose, sequence_number, amount),
                });
            }
            if paid.is_negative() {
                warn!(student = %student, %purpose, term = sequence_number, %paid, "negative paid total");
                return Err(FeeError::NegativePaid {
                    purpose,
                    term: sequence_number,
                    paid,
                });
            }
            if paid > amount {
                warn!(
                    student = %student,
                    %purpose,
                    term = sequence_number,
                    %amount,
                    %paid,
                    "ledger exceeds configured term amount"
                );
                return Err(FeeError::OverpaymentDetected {
                    purpose,
                    term: sequence_number,
                    amount,
                    paid,
                });
            }
            terms.push(TermSnapshot::derive(sequence_number, amount, paid));
        }

        Ok(ComponentSnapshot {
            purpose,
            actual_amount: component.actual_amount,
            concession_amount: component.concession_amount,
            total_amount: component.total_amount(),
            multi_term,
            terms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComponentConfig;
    use crate::ledger::LedgerEntry;
    use crate::types::PaymentMethod;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn term(sequence_number: u32, amount: i64, paid: i64) -> Term {
        Term {
            sequence_number,
            amount: Money::from_major(amount),
            paid: Money::from_major(paid),
        }
    }

    fn tuition(terms: Vec<Term>) -> FeeComponent {
        let total: Money = terms.iter().map(|t| t.amount).sum();
        FeeComponent {
            purpose: Purpose::Tuition,
            actual_amount: total,
            concession_amount: Money::ZERO,
            terms,
            paid: Money::ZERO,
        }
    }

    #[test]
    fn test_three_term_tuition_snapshot() {
        let student = StudentRef::new("ADM-1");
        let component = tuition(vec![term(1, 5_000, 5_000), term(2, 5_000, 2_000), term(3, 5_000, 0)]);

        let snapshot = SnapshotBuilder::build(&student, &[component]).unwrap();
        let tuition = snapshot.component(Purpose::Tuition).unwrap();

        assert_eq!(tuition.terms[0].status, TermStatus::Paid);
        assert_eq!(tuition.terms[0].balance, Money::ZERO);
        assert_eq!(tuition.terms[1].status, TermStatus::Partial);
        assert_eq!(tuition.terms[1].balance, Money::from_major(3_000));
        assert_eq!(tuition.terms[2].status, TermStatus::Unpaid);
        assert_eq!(tuition.terms[2].balance, Money::from_major(5_000));
        assert_eq!(snapshot.overall_balance, Money::from_major(8_000));
        assert_eq!(snapshot.total_paid, Money::from_major(7_000));
        assert_eq!(snapshot.earliest_outstanding_term(Purpose::Tuition).unwrap().sequence_number, 2);
    }

    #[test]
    fn test_terms_are_ordered_by_sequence() {
        let student = StudentRef::new("ADM-1");
        let component = tuition(vec![term(3, 100, 0), term(1, 100, 100), term(2, 100, 50)]);

        let snapshot = SnapshotBuilder::build(&student, &[component]).unwrap();
        let sequence: Vec<u32> = snapshot.components[0].terms.iter().map(|t| t.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
    }

    #[test]
    fn test_waived_term_is_not_applicable() {
        let student = StudentRef::new("ADM-1");
        let component = tuition(vec![term(1, 0, 0), term(2, 4_000, 0)]);

        let snapshot = SnapshotBuilder::build(&student, &[component]).unwrap();
        assert_eq!(snapshot.components[0].terms[0].status, TermStatus::NotApplicable);
        assert_eq!(snapshot.components[0].terms[1].status, TermStatus::Unpaid);
    }

    #[test]
    fn test_overpaid_term_is_not_clamped() {
        let student = StudentRef::new("ADM-1");
        let component = tuition(vec![term(1, 5_000, 5_500)]);

        match SnapshotBuilder::build(&student, &[component]) {
            Err(FeeError::OverpaymentDetected { purpose, term, amount, paid }) => {
                assert_eq!(purpose, Purpose::Tuition);
                assert_eq!(term, 1);
                assert_eq!(amount, Money::from_major(5_000));
                assert_eq!(paid, Money::from_major(5_500));
            }
            other => panic!("expected overpayment detected, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_terms_not_matching_payable_amount() {
        let student = StudentRef::new("ADM-1");
        let mut component = tuition(vec![term(1, 5_000, 0), term(2, 5_000, 0)]);
        component.concession_amount = Money::from_major(1_000);

        assert!(matches!(
            SnapshotBuilder::build(&student, &[component]),
            Err(FeeError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_component_paid_with_terms_is_rejected() {
        let student = StudentRef::new("ADM-1");
        let mut component = tuition(vec![term(1, 5_000, 0), term(2, 5_000, 0)]);
        component.paid = Money::from_major(2_000);

        match SnapshotBuilder::build(&student, &[component]) {
            Err(FeeError::InvalidConfiguration { message }) => assert!(message.contains("per term")),
            other => panic!("expected invalid configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_one_shot_component_uses_single_term() {
        let student = StudentRef::new("ADM-1");
        let book = FeeComponent {
            purpose: Purpose::Book,
            actual_amount: Money::from_major(1_200),
            concession_amount: Money::from_major(200),
            terms: Vec::new(),
            paid: Money::from_major(400),
        };

        let snapshot = SnapshotBuilder::build(&student, &[book]).unwrap();
        let book = snapshot.component(Purpose::Book).unwrap();
        assert!(!book.multi_term);
        assert_eq!(book.terms.len(), 1);
        assert_eq!(book.terms[0].sequence_number, SINGLE_TERM);
        assert_eq!(book.terms[0].balance, Money::from_major(600));
        assert_eq!(book.terms[0].status, TermStatus::Partial);
    }

    #[test]
    fn test_no_components_is_missing_configuration() {
        let student = StudentRef::new("ADM-1");
        assert!(matches!(
            SnapshotBuilder::build(&student, &[]),
            Err(FeeError::MissingFeeStructure { .. })
        ));
    }

    #[test]
    fn test_from_ledger_is_pure() {
        let structure = FeeStructure::school_year(
            "ADM-7",
            Money::from_major(15_000),
            Money::ZERO,
            Some(Money::from_major(6_000)),
            Some(Money::from_major(1_000)),
            3,
        );
        let at = Utc.with_ymd_and_hms(2024, 4, 10, 10, 0, 0).unwrap();
        let reference = Uuid::new_v4();
        let ledger = Ledger::from_entries(vec![
            LedgerEntry::payment(
                structure.student.clone(),
                Purpose::Tuition,
                1,
                Money::from_major(5_000),
                PaymentMethod::Online,
                at,
                reference,
                0,
            ),
            LedgerEntry::payment(
                structure.student.clone(),
                Purpose::Book,
                SINGLE_TERM,
                Money::from_major(1_000),
                PaymentMethod::Cash,
                at,
                reference,
                1,
            ),
        ]);

        let first = SnapshotBuilder::from_ledger(&structure, &ledger).unwrap();
        let second = SnapshotBuilder::from_ledger(&structure, &ledger).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.total_due, Money::from_major(22_000));
        assert_eq!(first.total_paid, Money::from_major(6_000));
        assert_eq!(first.overall_balance, Money::from_major(16_000));
        assert_eq!(first.balance_for(Purpose::Book), Some(Money::ZERO));
        assert_eq!(first.balance_for(Purpose::Transport), Some(Money::from_major(6_000)));
        assert_eq!(first.balance_for(Purpose::Other), None);
    }

    #[test]
    fn test_from_ledger_rejects_orphan_entries() {
        let structure = FeeStructure::new("ADM-7")
            .with_component(ComponentConfig::one_time(Purpose::Book, Money::from_major(500)));
        let ledger = Ledger::from_entries(vec![LedgerEntry::payment(
            structure.student.clone(),
            Purpose::Book,
            2,
            Money::from_major(100),
            PaymentMethod::Cash,
            Utc::now(),
            Uuid::new_v4(),
            0,
        )]);

        assert!(matches!(
            SnapshotBuilder::from_ledger(&structure, &ledger),
            Err(FeeError::OrphanLedgerEntry { purpose: Purpose::Book, term: 2 })
        ));
    }

    #[test]
    fn test_reversal_exceeding_payments_is_negative_paid() {
        let structure = FeeStructure::new("ADM-7")
            .with_component(ComponentConfig::one_time(Purpose::Book, Money::from_major(500)));
        let payment = LedgerEntry::payment(
            structure.student.clone(),
            Purpose::Book,
            SINGLE_TERM,
            Money::from_major(100),
            PaymentMethod::Cash,
            Utc::now(),
            Uuid::new_v4(),
            0,
        );
        let reversal = LedgerEntry::reversal_of(&payment, Utc::now(), Uuid::new_v4());
        let ledger = Ledger::from_entries(vec![payment, reversal.clone(), reversal]);

        assert!(matches!(
            SnapshotBuilder::from_ledger(&structure, &ledger),
            Err(FeeError::NegativePaid { .. })
        ));
    }
}

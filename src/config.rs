use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::types::{AutoAllocation, Purpose, StudentRef};

/// engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// how lines without a term are targeted
    pub auto_allocation: AutoAllocation,
    /// prefix of receipt numbers handed out by the store
    pub receipt_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_allocation: AutoAllocation::OldestDebtFirst,
            receipt_prefix: "RCPT".to_string(),
        }
    }
}

impl EngineConfig {
    /// every line must land inside a single term
    pub fn strict() -> Self {
        Self {
            auto_allocation: AutoAllocation::EarliestTermOnly,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        if config.receipt_prefix.trim().is_empty() {
            return Err(FeeError::InvalidConfiguration {
                message: "receipt prefix must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}

/// one scheduled installment of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub sequence_number: u32,
    pub amount: Money,
}

/// fee configuration for one purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub purpose: Purpose,
    pub actual_amount: Money,
    #[serde(default)]
    pub concession_amount: Money,
    /// empty for one-shot purposes such as books
    #[serde(default)]
    pub installments: Vec<Installment>,
}

impl ComponentConfig {
    /// one-shot fee, paid as a single implicit term
    pub fn one_time(purpose: Purpose, actual_amount: Money) -> Self {
        Self {
            purpose,
            actual_amount,
            concession_amount: Money::ZERO,
            installments: Vec::new(),
        }
    }

    /// split the payable amount evenly over `terms` installments
    pub fn split_evenly(
        purpose: Purpose,
        actual_amount: Money,
        concession_amount: Money,
        terms: u32,
    ) -> Self {
        let payable = actual_amount.saturating_sub(concession_amount);
        let installments = payable
            .split(terms)
            .into_iter()
            .zip(1..)
            .map(|(amount, sequence_number)| Installment { sequence_number, amount })
            .collect();

        Self {
            purpose,
            actual_amount,
            concession_amount,
            installments,
        }
    }

    /// explicit installment amounts, numbered from 1 in the given order
    pub fn with_installments(purpose: Purpose, concession_amount: Money, amounts: &[Money]) -> Self {
        let installments: Vec<Installment> = amounts
            .iter()
            .zip(1..)
            .map(|(&amount, sequence_number)| Installment { sequence_number, amount })
            .collect();
        let actual_amount = amounts.iter().sum::<Money>() + concession_amount;

        Self {
            purpose,
            actual_amount,
            concession_amount,
            installments,
        }
    }

    /// concession given as a percentage of the actual amount
    pub fn concession_percent(mut self, percent: Decimal) -> Self {
        let concession = self.actual_amount.percentage(percent);
        let terms = self.installments.len() as u32;
        self.concession_amount = concession;
        if terms > 0 {
            let rebuilt = Self::split_evenly(self.purpose, self.actual_amount, concession, terms);
            self.installments = rebuilt.installments;
        }
        self
    }

    /// actual amount minus concession
    pub fn total_amount(&self) -> Money {
        self.actual_amount - self.concession_amount
    }

    pub fn is_multi_term(&self) -> bool {
        !self.installments.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.actual_amount.is_negative() {
            return Err(FeeError::InvalidConfiguration {
                message: format!("{}: actual amount {} is negative", self.purpose, self.actual_amount),
            });
        }
        if self.concession_amount.is_negative() || self.concession_amount > self.actual_amount {
            return Err(FeeError::InvalidConfiguration {
                message: format!(
                    "{}: concession {} must be between 0 and actual amount {}",
                    self.purpose, self.concession_amount, self.actual_amount
                ),
            });
        }

        if self.installments.is_empty() {
            return Ok(());
        }

        let mut seen = BTreeSet::new();
        for installment in &self.installments {
            if installment.sequence_number == 0 {
                return Err(FeeError::InvalidConfiguration {
                    message: format!("{}: term sequence numbers start at 1", self.purpose),
                });
            }
            if !seen.insert(installment.sequence_number) {
                return Err(FeeError::InvalidConfiguration {
                    message: format!(
                        "{}: duplicate term {}",
                        self.purpose, installment.sequence_number
                    ),
                });
            }
            if installment.amount.is_negative() {
                return Err(FeeError::InvalidConfiguration {
                    message: format!(
                        "{}: term {} amount {} is negative",
                        self.purpose, installment.sequence_number, installment.amount
                    ),
                });
            }
        }

        let scheduled: Money = self.installments.iter().map(|i| i.amount).sum();
        if scheduled != self.total_amount() {
            return Err(FeeError::InvalidConfiguration {
                message: format!(
                    "{}: terms sum to {} but actual minus concession is {}",
                    self.purpose,
                    scheduled,
                    self.total_amount()
                ),
            });
        }

        Ok(())
    }
}

/// fee structure of one student enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub student: StudentRef,
    pub components: Vec<ComponentConfig>,
}

impl FeeStructure {
    pub fn new(student: impl Into<StudentRef>) -> Self {
        Self {
            student: student.into(),
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: ComponentConfig) -> Self {
        self.components.push(component);
        self
    }

    /// typical school setup: tuition and transport in terms, books once
    pub fn school_year(
        student: impl Into<StudentRef>,
        tuition: Money,
        tuition_concession: Money,
        transport: Option<Money>,
        book: Option<Money>,
        terms: u32,
    ) -> Self {
        let mut structure = Self::new(student).with_component(ComponentConfig::split_evenly(
            Purpose::Tuition,
            tuition,
            tuition_concession,
            terms,
        ));
        if let Some(transport) = transport {
            structure = structure.with_component(ComponentConfig::split_evenly(
                Purpose::Transport,
                transport,
                Money::ZERO,
                terms,
            ));
        }
        if let Some(book) = book {
            structure = structure.with_component(ComponentConfig::one_time(Purpose::Book, book));
        }
        structure
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let structure: FeeStructure = serde_json::from_str(json)?;
        structure.validate()?;
        Ok(structure)
    }

    pub fn component(&self, purpose: Purpose) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.purpose == purpose)
    }

    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(FeeError::MissingFeeStructure {
                student: self.student.clone(),
            });
        }

        let mut purposes = BTreeSet::new();
        for component in &self.components {
            if !purposes.insert(component.purpose) {
                return Err(FeeError::InvalidConfiguration {
                    message: format!("{} configured twice for {}", component.purpose, self.student),
                });
            }
            component.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_evenly_matches_payable_amount() {
        let tuition = ComponentConfig::split_evenly(
            Purpose::Tuition,
            Money::from_major(16_000),
            Money::from_major(1_000),
            3,
        );

        assert_eq!(tuition.total_amount(), Money::from_major(15_000));
        assert_eq!(tuition.installments.len(), 3);
        assert!(tuition.installments.iter().all(|i| i.amount == Money::from_major(5_000)));
        assert_eq!(tuition.installments[2].sequence_number, 3);
        tuition.validate().unwrap();
    }

    #[test]
    fn test_concession_percent_rebuilds_terms() {
        let tuition = ComponentConfig::split_evenly(Purpose::Tuition, Money::from_major(12_000), Money::ZERO, 2)
            .concession_percent(dec!(25));

        assert_eq!(tuition.concession_amount, Money::from_major(3_000));
        assert_eq!(tuition.installments[0].amount, Money::from_major(4_500));
        tuition.validate().unwrap();
    }

    #[test]
    fn test_rejects_concession_above_actual() {
        let mut book = ComponentConfig::one_time(Purpose::Book, Money::from_major(800));
        book.concession_amount = Money::from_major(900);

        assert!(matches!(book.validate(), Err(FeeError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_rejects_term_sum_mismatch() {
        let mut transport =
            ComponentConfig::split_evenly(Purpose::Transport, Money::from_major(6_000), Money::ZERO, 2);
        transport.installments[1].amount = Money::from_major(2_000);

        let err = transport.validate().unwrap_err();
        assert!(matches!(err, FeeError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("terms sum to"));
    }

    #[test]
    fn test_rejects_duplicate_terms_and_purposes() {
        let mut tuition =
            ComponentConfig::with_installments(Purpose::Tuition, Money::ZERO, &[Money::from_major(100), Money::from_major(100)]);
        tuition.installments[1].sequence_number = 1;
        assert!(tuition.validate().is_err());

        let structure = FeeStructure::new("ADM-1")
            .with_component(ComponentConfig::one_time(Purpose::Book, Money::from_major(500)))
            .with_component(ComponentConfig::one_time(Purpose::Book, Money::from_major(500)));
        assert!(structure.validate().is_err());
    }

    #[test]
    fn test_empty_structure_is_missing_configuration() {
        let structure = FeeStructure::new("ADM-404");
        assert!(matches!(
            structure.validate(),
            Err(FeeError::MissingFeeStructure { .. })
        ));
    }

    #[test]
    fn test_structure_from_json() {
        let json = r#"{
            "student": "ADM-2024-017",
            "components": [
                {
                    "purpose": "TUITION",
                    "actual_amount": "15000",
                    "installments": [
                        { "sequence_number": 1, "amount": "5000" },
                        { "sequence_number": 2, "amount": "5000" },
                        { "sequence_number": 3, "amount": "5000" }
                    ]
                },
                { "purpose": "BOOK", "actual_amount": "1200", "concession_amount": "200" }
            ]
        }"#;

        let structure = FeeStructure::from_json(json).unwrap();
        assert_eq!(structure.student.as_str(), "ADM-2024-017");
        assert!(structure.component(Purpose::Tuition).unwrap().is_multi_term());
        assert_eq!(
            structure.component(Purpose::Book).unwrap().total_amount(),
            Money::from_major(1_000)
        );
    }

    #[test]
    fn test_engine_config_from_json() {
        let config = EngineConfig::from_json(r#"{ "auto_allocation": "earliest_term_only" }"#).unwrap();
        assert_eq!(config.auto_allocation, AutoAllocation::EarliestTermOnly);
        assert_eq!(config.receipt_prefix, "RCPT");

        assert!(EngineConfig::from_json(r#"{ "receipt_prefix": " " }"#).is_err());
    }
}

/// serializable views for balance panels, receipts and dashboards
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocation::ReceiptSummary;
use crate::classifier::{classify, classify_component, RosterSummary};
use crate::decimal::Money;
use crate::snapshot::{ComponentSnapshot, StudentFeeSnapshot, TermSnapshot};
use crate::types::{PaymentStatus, Purpose, StudentRef};

/// one purpose's balances, as shown by the tuition and transport panels
#[derive(Debug, Serialize, Deserialize)]
pub struct BalancePanelView {
    pub student: StudentRef,
    pub purpose: Purpose,
    pub actual_amount: Money,
    pub concession_amount: Money,
    pub total_amount: Money,
    pub total_paid: Money,
    pub balance: Money,
    pub status: PaymentStatus,
    pub next_due_term: Option<u32>,
    pub terms: Vec<TermSnapshot>,
}

impl BalancePanelView {
    pub fn from_component(student: &StudentRef, component: &ComponentSnapshot) -> Self {
        Self {
            student: student.clone(),
            purpose: component.purpose,
            actual_amount: component.actual_amount,
            concession_amount: component.concession_amount,
            total_amount: component.total_amount,
            total_paid: component.total_paid(),
            balance: component.balance(),
            status: classify_component(component),
            next_due_term: component.earliest_outstanding().map(|t| t.sequence_number),
            terms: component.terms.clone(),
        }
    }

    /// panel for one purpose of a snapshot, if the student has that fee
    pub fn for_purpose(snapshot: &StudentFeeSnapshot, purpose: Purpose) -> Option<Self> {
        snapshot
            .component(purpose)
            .map(|component| Self::from_component(&snapshot.student, component))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// whole-student view for the collect-fee screen
#[derive(Debug, Serialize, Deserialize)]
pub struct StudentFeeView {
    pub student: StudentRef,
    pub status: PaymentStatus,
    pub total_due: Money,
    pub total_paid: Money,
    pub overall_balance: Money,
    pub panels: Vec<BalancePanelView>,
}

impl StudentFeeView {
    pub fn from_snapshot(snapshot: &StudentFeeSnapshot) -> Self {
        Self {
            student: snapshot.student.clone(),
            status: classify(snapshot),
            total_due: snapshot.total_due,
            total_paid: snapshot.total_paid,
            overall_balance: snapshot.overall_balance,
            panels: snapshot
                .components
                .iter()
                .map(|component| BalancePanelView::from_component(&snapshot.student, component))
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// dashboard stats cards
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardView {
    pub students: usize,
    pub paid: usize,
    pub partial: usize,
    pub outstanding: usize,
    pub total_collected: Money,
    pub total_outstanding: Money,
    pub collection_rate: Decimal,
}

impl DashboardView {
    pub fn from_summary(summary: &RosterSummary) -> Self {
        Self {
            students: summary.student_count(),
            paid: summary.paid_count,
            partial: summary.partial_count,
            outstanding: summary.outstanding_count,
            total_collected: summary.total_collected,
            total_outstanding: summary.total_outstanding,
            collection_rate: summary.collection_rate(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// receipt payload handed to the pdf renderer
pub fn receipt_json(receipt: &ReceiptSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeeStructure;
    use crate::ledger::Ledger;
    use crate::snapshot::SnapshotBuilder;

    fn snapshot() -> StudentFeeSnapshot {
        let structure = FeeStructure::school_year(
            "ADM-9",
            Money::from_major(9_000),
            Money::ZERO,
            Some(Money::from_major(3_000)),
            None,
            3,
        );
        SnapshotBuilder::from_ledger(&structure, &Ledger::new()).unwrap()
    }

    #[test]
    fn test_transport_panel() {
        let panel = BalancePanelView::for_purpose(&snapshot(), Purpose::Transport).unwrap();
        assert_eq!(panel.balance, Money::from_major(3_000));
        assert_eq!(panel.status, PaymentStatus::Outstanding);
        assert_eq!(panel.next_due_term, Some(1));
        assert_eq!(panel.terms.len(), 3);

        assert!(BalancePanelView::for_purpose(&snapshot(), Purpose::Book).is_none());
    }

    #[test]
    fn test_student_view_json() {
        let view = StudentFeeView::from_snapshot(&snapshot());
        let json = view.to_json_pretty().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["student"], "ADM-9");
        assert_eq!(parsed["status"], "OUTSTANDING");
        assert_eq!(parsed["panels"][0]["purpose"], "TUITION");
        assert_eq!(parsed["panels"][0]["terms"][0]["status"], "UNPAID");
        let balance = parsed["overall_balance"].as_str().unwrap();
        assert_eq!(Money::from_str_exact(balance).unwrap(), Money::from_major(12_000));
    }

    #[test]
    fn test_dashboard_view() {
        let summary = RosterSummary::from_snapshots([&snapshot()]).unwrap();
        let dashboard = DashboardView::from_summary(&summary);
        assert_eq!(dashboard.students, 1);
        assert_eq!(dashboard.outstanding, 1);
        assert_eq!(dashboard.collection_rate, Decimal::ZERO);
    }
}

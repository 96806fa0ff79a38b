/// roster dashboard - paid / partial / outstanding counts
use fee_ledger_rs::views::DashboardView;
use fee_ledger_rs::{
    FeeStructure, LedgerStore, Money, PaymentLine, PaymentMethod, PaymentRequest, Purpose,
    SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let store = LedgerStore::default();

    let payments = [("ADM-01", 12_000), ("ADM-02", 4_500), ("ADM-03", 0), ("ADM-04", 12_000)];
    for (student, paid) in payments {
        store.register_structure(
            FeeStructure::school_year(student, Money::from_major(12_000), Money::ZERO, None, None, 4),
            &time,
        )?;
        if paid > 0 {
            let request = PaymentRequest::new(student).line(PaymentLine::new(
                Purpose::Tuition,
                Money::from_major(paid),
                PaymentMethod::Online,
            ));
            store.submit_payment(&request, &time)?;
        }
    }

    let summary = store.roster_summary()?;
    println!("{}", DashboardView::from_summary(&summary).to_json_pretty()?);

    for (student, balance) in summary.defaulters() {
        println!("{student}: {balance} outstanding");
    }

    Ok(())
}

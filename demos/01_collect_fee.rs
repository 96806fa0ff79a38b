/// collect fee - multi-purpose payment with a receipt
use chrono::{TimeZone, Utc};
use fee_ledger_rs::views::{receipt_json, StudentFeeView};
use fee_ledger_rs::{
    FeeStructure, LedgerStore, Money, PaymentLine, PaymentMethod, PaymentRequest, Purpose,
    SafeTimeProvider, StudentRef, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== collect fee ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap(),
    ));
    let store = LedgerStore::default();
    let student = StudentRef::new("ADM-2024-042");

    store.register_structure(
        FeeStructure::school_year(
            student.clone(),
            Money::from_major(15_000),
            Money::ZERO,
            Some(Money::from_major(6_000)),
            Some(Money::from_major(1_200)),
            3,
        ),
        &time,
    )?;

    // tuition without a term clears the oldest dues first
    let request = PaymentRequest::new(student.clone())
        .line(PaymentLine::new(Purpose::Tuition, Money::from_major(7_000), PaymentMethod::Cash))
        .line(PaymentLine::new(Purpose::Transport, Money::from_major(2_000), PaymentMethod::Online).for_term(1))
        .line(PaymentLine::new(Purpose::Book, Money::from_major(1_200), PaymentMethod::Cash))
        .remarks("first visit");

    let allocation = store.submit_payment(&request, &time)?;
    println!("receipt:\n{}\n", receipt_json(&allocation.receipt)?);

    // paying more than a term owes is rejected and nothing is written
    let too_much = PaymentRequest::new(student.clone())
        .line(PaymentLine::new(Purpose::Transport, Money::from_major(5_000), PaymentMethod::Cash).for_term(2));
    match store.submit_payment(&too_much, &time) {
        Ok(_) => println!("unexpectedly accepted"),
        Err(err) => println!("rejected: {}\n", err),
    }

    let snapshot = store.snapshot(&student)?;
    println!("balances after payment:\n{}", StudentFeeView::from_snapshot(&snapshot).to_json_pretty()?);

    Ok(())
}

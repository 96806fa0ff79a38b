/// quick start - register a fee structure and read balances
use fee_ledger_rs::{FeeStructure, LedgerStore, Money, Purpose, SafeTimeProvider, StudentRef, TimeSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let store = LedgerStore::default();

    let structure = FeeStructure::school_year(
        "ADM-2024-001",
        Money::from_major(30_000),
        Money::from_major(3_000),
        Some(Money::from_major(9_000)),
        Some(Money::from_major(1_500)),
        3,
    );
    store.register_structure(structure, &time)?;

    let snapshot = store.snapshot(&StudentRef::new("ADM-2024-001"))?;
    println!("total due: {}", snapshot.total_due);
    println!("tuition balance: {:?}", snapshot.balance_for(Purpose::Tuition));
    println!("overall balance: {}", snapshot.overall_balance);

    Ok(())
}

pub mod allocation;
pub mod classifier;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use allocation::{Allocation, Allocator, PaymentLine, PaymentRequest, ReceiptLine, ReceiptSummary};
pub use classifier::{classify, classify_component, RosterSummary};
pub use config::{ComponentConfig, EngineConfig, FeeStructure, Installment};
pub use decimal::Money;
pub use errors::{FeeError, Result};
pub use events::{Event, EventStore};
pub use ledger::{Ledger, LedgerEntry};
pub use snapshot::{
    ComponentSnapshot, FeeComponent, SnapshotBuilder, StudentFeeSnapshot, Term, TermSnapshot,
};
pub use store::LedgerStore;
pub use types::{
    AutoAllocation, EntryKind, PaymentMethod, PaymentStatus, Purpose, ReferenceId, StudentRef,
    TermStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;

pub mod audit;
pub mod proof;
pub mod quarantine;
pub mod recurring;
pub mod transaction;
pub mod vendor;
pub mod wallet;

pub use audit::AuditEntry;
pub use proof::{PaymentProof, ProofStatus, QuarantineState};
pub use quarantine::{QuarantineEntry, QuarantineStatus, ReviewAction, RiskLevel, ScanReport};
pub use recurring::{
    Frequency, RecurringPayment, RecurringStatus, ScheduledPayment, ScheduledStatus,
};
pub use transaction::{
    DeclineCategory, GatewayReceipt, Transaction, TransactionError, TransactionStatus,
};
pub use vendor::Vendor;
pub use wallet::{WalletOperation, WalletTransaction};

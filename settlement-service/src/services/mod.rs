pub mod audit;
pub mod authorizer;
pub mod gateway;
pub mod metrics;
pub mod phone;
pub mod proof_access;
pub mod proofs;
pub mod quarantine;
pub mod recurring;
pub mod repository;
pub mod scanner;
pub mod storage;
pub mod transactions;
pub mod wallet;

pub use audit::AuditTrail;
pub use authorizer::{Authorizer, Capability};
pub use gateway::GatewayRouter;
pub use metrics::{get_metrics, init_metrics};
pub use proof_access::SecureProofAccessGateway;
pub use proofs::ProofUploadPipeline;
pub use quarantine::QuarantineService;
pub use recurring::RecurringPaymentScheduler;
pub use scanner::{MalwareScanner, SignatureScanner};
pub use storage::{LocalStorage, Storage};
pub use transactions::TransactionLedger;
pub use wallet::WalletLedger;

//! Wallet ledger model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of a wallet ledger operation. Deposits credit the balance, all other
/// kinds debit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletOperation {
    Deposit,
    Withdraw,
    Transfer,
    Payment,
}

impl WalletOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletOperation::Deposit => "deposit",
            WalletOperation::Withdraw => "withdraw",
            WalletOperation::Transfer => "transfer",
            WalletOperation::Payment => "payment",
        }
    }

    /// Signed direction of the operation against the balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, WalletOperation::Deposit)
    }
}

/// One immutable entry in the wallet history, with the balance snapshot taken
/// after the operation was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: WalletOperation,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

//! In-process wallet ledger.
//!
//! The balance check and the debit happen under one lock, so the balance can
//! never go negative no matter how calls interleave. Every operation appends
//! exactly one history entry carrying the resulting balance snapshot.

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::error::PaymentError;
use crate::models::wallet::{WalletOperation, WalletTransaction};

struct WalletState {
    balance: Decimal,
    history: Vec<WalletTransaction>,
    next_id: i64,
}

pub struct WalletLedger {
    state: Mutex<WalletState>,
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::with_balance(Decimal::ZERO)
    }

    pub fn with_balance(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(WalletState {
                balance,
                history: Vec::new(),
                next_id: 0,
            }),
        }
    }

    pub async fn deposit(
        &self,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<WalletTransaction, PaymentError> {
        self.credit(WalletOperation::Deposit, amount, reference)
            .await
    }

    pub async fn withdraw(
        &self,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<WalletTransaction, PaymentError> {
        self.debit(WalletOperation::Withdraw, amount, reference)
            .await
    }

    pub async fn transfer(
        &self,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<WalletTransaction, PaymentError> {
        self.debit(WalletOperation::Transfer, amount, reference)
            .await
    }

    pub async fn pay(
        &self,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<WalletTransaction, PaymentError> {
        self.debit(WalletOperation::Payment, amount, reference).await
    }

    pub async fn balance(&self) -> Decimal {
        self.state.lock().await.balance
    }

    /// Most-recent-first history, capped at `limit`.
    pub async fn history(&self, limit: usize) -> Vec<WalletTransaction> {
        let state = self.state.lock().await;
        state.history.iter().rev().take(limit).cloned().collect()
    }

    async fn credit(
        &self,
        kind: WalletOperation,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<WalletTransaction, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let mut state = self.state.lock().await;
        state.balance += amount;
        Ok(Self::record(&mut state, kind, amount, reference))
    }

    async fn debit(
        &self,
        kind: WalletOperation,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<WalletTransaction, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let mut state = self.state.lock().await;
        if amount > state.balance {
            return Err(PaymentError::InsufficientBalance {
                available: state.balance,
                requested: amount,
            });
        }
        state.balance -= amount;
        Ok(Self::record(&mut state, kind, amount, reference))
    }

    fn record(
        state: &mut WalletState,
        kind: WalletOperation,
        amount: Decimal,
        reference: Option<String>,
    ) -> WalletTransaction {
        state.next_id += 1;
        let entry = WalletTransaction {
            id: state.next_id,
            kind,
            amount,
            balance_after: state.balance,
            timestamp: Utc::now(),
            reference,
        };
        state.history.push(entry.clone());
        counter!("wallet_operations_total", "type" => kind.as_str()).increment(1);
        entry
    }
}

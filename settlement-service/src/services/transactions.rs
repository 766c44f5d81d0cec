//! Append-only ledger of payment attempts plus the charge orchestrators.
//!
//! Every attempt, successful or not, lands as its own immutable record.
//! Retries never mutate the original attempt; they append a new record
//! linked through `original_transaction_id`.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use metrics::counter;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::retry::RetryConfig;

use crate::error::PaymentError;
use crate::models::transaction::{
    DeclineCategory, GatewayReceipt, Transaction, TransactionError, TransactionStatus,
};
use crate::services::gateway::GatewayRouter;
use crate::services::repository::TransactionStore;

/// Fields the caller supplies when appending an attempt.
#[derive(Debug, Clone)]
pub struct AttemptDraft {
    pub order_id: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub retry_count: u32,
    pub original_transaction_id: Option<String>,
    pub error: Option<TransactionError>,
    pub gateway_response: Option<GatewayReceipt>,
}

/// Result of a verification decision.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub verified: bool,
    pub transaction: Transaction,
}

#[derive(Debug, Clone)]
pub struct CardDetails {
    pub card_number: String,
    /// MM/YY.
    pub expiry: String,
    pub cvv: String,
    pub holder_name: String,
}

pub struct TransactionLedger {
    store: Arc<dyn TransactionStore>,
    router: Arc<GatewayRouter>,
    retry_policy: RetryConfig,
    /// Probability in [0, 1] that a structurally valid card is declined.
    card_decline_rate: f64,
}

impl TransactionLedger {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        router: Arc<GatewayRouter>,
        retry_policy: RetryConfig,
        card_decline_rate: f64,
    ) -> Self {
        Self {
            store,
            router,
            retry_policy,
            card_decline_rate,
        }
    }

    /// Append one attempt, assigning its numeric id and transaction id.
    pub async fn record(&self, draft: AttemptDraft) -> Transaction {
        let transaction = Transaction {
            id: 0,
            order_id: draft.order_id,
            amount: draft.amount,
            payment_method: draft.payment_method,
            status: draft.status,
            transaction_id: generate_transaction_id(),
            timestamp: Utc::now(),
            retry_count: draft.retry_count,
            original_transaction_id: draft.original_transaction_id,
            error: draft.error,
            gateway_response: draft.gateway_response,
        };
        self.store.insert(transaction).await
    }

    /// Append a retry attempt linked to an existing transaction.
    pub async fn retry(
        &self,
        original_transaction_id: &str,
        mut draft: AttemptDraft,
    ) -> Result<Transaction, PaymentError> {
        let original = self
            .store
            .get_by_transaction_id(original_transaction_id)
            .await
            .ok_or_else(|| PaymentError::not_found("Transaction"))?;
        draft.original_transaction_id = Some(original.transaction_id);
        Ok(self.record(draft).await)
    }

    /// Apply a verification decision.
    ///
    /// A transaction that already reached `completed` is left untouched and
    /// reported as verified, so repeated calls are idempotent.
    pub async fn verify(
        &self,
        transaction_id: &str,
        approved: bool,
    ) -> Result<VerifyOutcome, PaymentError> {
        let mut transaction = self
            .store
            .get_by_transaction_id(transaction_id)
            .await
            .ok_or_else(|| PaymentError::not_found("Transaction"))?;

        if transaction.status == TransactionStatus::Completed {
            return Ok(VerifyOutcome {
                verified: true,
                transaction,
            });
        }

        transaction.status = if approved {
            TransactionStatus::Completed
        } else {
            TransactionStatus::VerificationFailed
        };
        let transaction = self
            .store
            .update(transaction)
            .await
            .ok_or_else(|| PaymentError::not_found("Transaction"))?;
        Ok(VerifyOutcome {
            verified: approved,
            transaction,
        })
    }

    pub async fn by_order(&self, order_id: &str) -> Vec<Transaction> {
        self.store.find_by_order(order_id).await
    }

    pub async fn by_transaction_id(&self, transaction_id: &str) -> Result<Transaction, PaymentError> {
        self.store
            .get_by_transaction_id(transaction_id)
            .await
            .ok_or_else(|| PaymentError::not_found("Transaction"))
    }

    pub async fn list(&self, page: u32, page_size: u32) -> (Vec<Transaction>, usize) {
        self.store.list(page, page_size).await
    }

    /// Charge a card. Declines append a failed record before surfacing the
    /// error; malformed card data is rejected without touching the ledger.
    pub async fn charge_card(
        &self,
        details: &CardDetails,
        amount: Decimal,
        order_id: &str,
    ) -> Result<Transaction, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let card_number = validate_card(details)?;

        if rand::random::<f64>() < self.card_decline_rate {
            let failed = self
                .record(AttemptDraft {
                    order_id: order_id.to_string(),
                    amount,
                    payment_method: "card".to_string(),
                    status: TransactionStatus::Failed,
                    retry_count: 0,
                    original_transaction_id: None,
                    error: Some(TransactionError {
                        code: "CARD_DECLINED".to_string(),
                        message: "Card was declined by the issuing bank".to_string(),
                        category: DeclineCategory::Gateway,
                    }),
                    gateway_response: None,
                })
                .await;
            counter!("payments_total", "method" => "card", "status" => "failed").increment(1);
            tracing::warn!(
                transaction_id = %failed.transaction_id,
                order_id,
                "card charge declined"
            );
            return Err(PaymentError::CardDeclined {
                code: "CARD_DECLINED".to_string(),
            });
        }

        let last4 = &card_number[card_number.len() - 4..];
        let transaction = self
            .record(AttemptDraft {
                order_id: order_id.to_string(),
                amount,
                payment_method: "card".to_string(),
                status: TransactionStatus::Completed,
                retry_count: 0,
                original_transaction_id: None,
                error: None,
                gateway_response: Some(GatewayReceipt {
                    gateway_transaction_id: format!(
                        "CARD{}{}",
                        Utc::now().timestamp_millis(),
                        random_code(4)
                    ),
                    reference: format!("AUTH-{}", random_code(6)),
                    masked_card: Some(format!("**** **** **** {last4}")),
                }),
            })
            .await;
        counter!("payments_total", "method" => "card", "status" => "completed").increment(1);
        Ok(transaction)
    }

    /// Charge through a digital-wallet gateway with automatic retry.
    ///
    /// Each attempt appends its own record; retries link back to the first
    /// attempt. Exhausted or non-retryable declines return the final failed
    /// transaction rather than an error, so terminal failure stays a
    /// queryable state. Only caller input problems surface as errors.
    pub async fn charge_wallet(
        &self,
        gateway: &str,
        amount: Decimal,
        order_id: &str,
        phone: &str,
    ) -> Result<Transaction, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }

        let mut first_transaction_id: Option<String> = None;
        let mut attempt: u32 = 0;
        loop {
            match self.router.attempt(gateway, amount, phone).await {
                Ok(approval) => {
                    let draft = AttemptDraft {
                        order_id: order_id.to_string(),
                        amount,
                        payment_method: gateway.to_string(),
                        status: TransactionStatus::Completed,
                        retry_count: attempt,
                        original_transaction_id: first_transaction_id.clone(),
                        error: None,
                        gateway_response: Some(GatewayReceipt {
                            gateway_transaction_id: approval.gateway_transaction_id,
                            reference: approval.reference,
                            masked_card: None,
                        }),
                    };
                    let transaction = if let Some(original) = &first_transaction_id {
                        self.retry(original, draft).await?
                    } else {
                        self.record(draft).await
                    };
                    counter!("payments_total", "gateway" => gateway.to_string(), "status" => "completed")
                        .increment(1);
                    if attempt > 0 {
                        tracing::info!(
                            transaction_id = %transaction.transaction_id,
                            attempt = attempt + 1,
                            gateway,
                            "wallet charge succeeded after retry"
                        );
                    }
                    return Ok(transaction);
                }
                Err(decline) if decline.category == DeclineCategory::Validation => {
                    return Err(PaymentError::Validation {
                        message: format!("{}: {}", decline.code, decline.message),
                    });
                }
                Err(decline) => {
                    let draft = AttemptDraft {
                        order_id: order_id.to_string(),
                        amount,
                        payment_method: gateway.to_string(),
                        status: TransactionStatus::Failed,
                        retry_count: attempt,
                        original_transaction_id: first_transaction_id.clone(),
                        error: Some(TransactionError {
                            code: decline.code.clone(),
                            message: decline.message.clone(),
                            category: decline.category,
                        }),
                        gateway_response: None,
                    };
                    let transaction = if let Some(original) = &first_transaction_id {
                        self.retry(original, draft).await?
                    } else {
                        self.record(draft).await
                    };
                    if first_transaction_id.is_none() {
                        first_transaction_id = Some(transaction.transaction_id.clone());
                    }
                    counter!("payments_total", "gateway" => gateway.to_string(), "status" => "failed")
                        .increment(1);

                    if !decline.retryable || attempt >= self.retry_policy.max_retries {
                        tracing::warn!(
                            transaction_id = %transaction.transaction_id,
                            gateway,
                            code = %decline.code,
                            attempts = attempt + 1,
                            "wallet charge failed terminally"
                        );
                        return Ok(transaction);
                    }

                    let backoff = self.retry_policy.backoff_duration(attempt);
                    tracing::info!(
                        gateway,
                        code = %decline.code,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis(),
                        "wallet charge failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Time-plus-random transaction id. Collisions need the same millisecond and
/// the same 6-character draw, negligible at practical volumes.
fn generate_transaction_id() -> String {
    format!("TXN{}{}", Utc::now().timestamp_millis(), random_code(6))
}

fn random_code(len: usize) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

fn validate_card(details: &CardDetails) -> Result<String, PaymentError> {
    let cleaned: String = details
        .card_number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::validation(
            "Card number must contain only digits",
        ));
    }
    if !(13..=19).contains(&cleaned.len()) {
        return Err(PaymentError::validation("Card number must be 13 to 19 digits"));
    }
    if !luhn_valid(&cleaned) {
        return Err(PaymentError::validation("Card number is invalid"));
    }

    let (year, month) = parse_expiry(&details.expiry)
        .ok_or_else(|| PaymentError::validation("Card expiry must be in MM/YY format"))?;
    let now = Utc::now();
    if (year, month) < (now.year(), now.month()) {
        return Err(PaymentError::validation("Card has expired"));
    }

    if !(details.cvv.len() == 3 || details.cvv.len() == 4)
        || !details.cvv.chars().all(|c| c.is_ascii_digit())
    {
        return Err(PaymentError::validation("CVV must be 3 or 4 digits"));
    }
    if details.holder_name.trim().is_empty() {
        return Err(PaymentError::validation("Card holder name is required"));
    }
    Ok(cleaned)
}

fn parse_expiry(expiry: &str) -> Option<(i32, u32)> {
    let (month, year) = expiry.split_once('/')?;
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    if year.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    Some((2000 + year, month))
}

fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;
    for c in digits.chars().rev() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::{GatewayAdapter, GatewayApproval, GatewayDecline};
    use crate::services::phone::Network;
    use crate::services::repository::InMemoryTransactionStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyGateway {
        remaining_failures: AtomicU32,
        retryable: bool,
    }

    impl FlakyGateway {
        fn new(failures: u32, retryable: bool) -> Self {
            Self {
                remaining_failures: AtomicU32::new(failures),
                retryable,
            }
        }
    }

    #[async_trait]
    impl GatewayAdapter for FlakyGateway {
        fn name(&self) -> &str {
            "flaky"
        }

        fn supported_networks(&self) -> &[Network] {
            &[Network::Jazz]
        }

        async fn attempt(
            &self,
            _amount: Decimal,
            _phone: &str,
        ) -> Result<GatewayApproval, GatewayDecline> {
            if self.remaining_failures.load(Ordering::SeqCst) > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(GatewayDecline {
                    code: "SERVICE_UNAVAILABLE".to_string(),
                    message: "gateway briefly down".to_string(),
                    category: DeclineCategory::Gateway,
                    retryable: self.retryable,
                });
            }
            Ok(GatewayApproval {
                gateway_transaction_id: "FL123".to_string(),
                reference: "REF-FLAKY".to_string(),
            })
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            backoff_multiplier: 2.0,
            add_jitter: false,
        }
    }

    fn ledger_with(adapters: Vec<Arc<dyn GatewayAdapter>>, max_retries: u32) -> TransactionLedger {
        TransactionLedger::new(
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(GatewayRouter::new(adapters, Duration::from_secs(1))),
            fast_retry(max_retries),
            0.0,
        )
    }

    fn sandbox_ledger(card_decline_rate: f64) -> TransactionLedger {
        TransactionLedger::new(
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(GatewayRouter::simulated(
                Duration::ZERO,
                Duration::from_secs(1),
                false,
            )),
            fast_retry(3),
            card_decline_rate,
        )
    }

    fn valid_card() -> CardDetails {
        CardDetails {
            card_number: "4242 4242 4242 4242".to_string(),
            expiry: "12/39".to_string(),
            cvv: "123".to_string(),
            holder_name: "Ayesha Khan".to_string(),
        }
    }

    #[tokio::test]
    async fn wallet_charge_completes_on_clean_gateway() {
        let ledger = sandbox_ledger(0.0);
        let tx = ledger
            .charge_wallet("jazzcash", Decimal::from(1000), "55", "03001234567")
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.amount, Decimal::from(1000));
        assert_eq!(tx.order_id, "55");
        assert_eq!(tx.retry_count, 0);
        assert!(tx.original_transaction_id.is_none());
        assert!(tx.gateway_response.is_some());
    }

    #[tokio::test]
    async fn wallet_charge_retries_transient_declines() {
        let ledger = ledger_with(vec![Arc::new(FlakyGateway::new(2, true))], 3);
        let tx = ledger
            .charge_wallet("flaky", Decimal::from(500), "order-9", "03001234567")
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.retry_count, 2);

        let attempts = ledger.by_order("order-9").await;
        assert_eq!(attempts.len(), 3);
        let first = &attempts[0];
        assert_eq!(first.status, TransactionStatus::Failed);
        assert!(first.original_transaction_id.is_none());
        for later in &attempts[1..] {
            assert_eq!(
                later.original_transaction_id.as_deref(),
                Some(first.transaction_id.as_str())
            );
            assert_ne!(later.transaction_id, first.transaction_id);
        }
    }

    #[tokio::test]
    async fn wallet_charge_exhausted_retries_end_in_failed_state() {
        let ledger = ledger_with(vec![Arc::new(FlakyGateway::new(10, true))], 2);
        let tx = ledger
            .charge_wallet("flaky", Decimal::from(500), "order-x", "03001234567")
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.retry_count, 2);
        assert_eq!(tx.error.as_ref().unwrap().code, "SERVICE_UNAVAILABLE");
        assert_eq!(ledger.by_order("order-x").await.len(), 3);
    }

    #[tokio::test]
    async fn wallet_charge_does_not_retry_terminal_declines() {
        let ledger = ledger_with(vec![Arc::new(FlakyGateway::new(10, false))], 3);
        let tx = ledger
            .charge_wallet("flaky", Decimal::from(500), "order-t", "03001234567")
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.retry_count, 0);
        assert_eq!(ledger.by_order("order-t").await.len(), 1);
    }

    #[tokio::test]
    async fn wallet_charge_validation_failures_leave_no_record() {
        let ledger = sandbox_ledger(0.0);
        // Warid number against SadaPay's allow-list.
        let err = ledger
            .charge_wallet("sadapay", Decimal::from(100), "order-v", "03211234567")
            .await
            .unwrap_err();
        match err {
            PaymentError::Validation { message } => {
                assert!(message.contains("UNSUPPORTED_NETWORK_SADAPAY"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let (_, total) = ledger.list(1, 10).await;
        assert_eq!(total, 0);

        let err = ledger
            .charge_wallet("jazzcash", Decimal::ZERO, "order-v", "03001234567")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount));
    }

    #[tokio::test]
    async fn retry_requires_known_original() {
        let ledger = sandbox_ledger(0.0);
        let draft = AttemptDraft {
            order_id: "o".to_string(),
            amount: Decimal::from(10),
            payment_method: "jazzcash".to_string(),
            status: TransactionStatus::Processing,
            retry_count: 1,
            original_transaction_id: None,
            error: None,
            gateway_response: None,
        };
        let err = ledger.retry("TXN-missing", draft).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn verify_is_idempotent_once_completed() {
        let ledger = sandbox_ledger(0.0);
        let tx = ledger
            .charge_wallet("jazzcash", Decimal::from(200), "order-v2", "03001234567")
            .await
            .unwrap();

        let first = ledger.verify(&tx.transaction_id, false).await.unwrap();
        assert!(first.verified);
        assert_eq!(first.transaction.status, TransactionStatus::Completed);
        assert_eq!(first.transaction.timestamp, tx.timestamp);

        let second = ledger.verify(&tx.transaction_id, true).await.unwrap();
        assert_eq!(second.transaction.timestamp, tx.timestamp);
        assert_eq!(second.transaction.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn verify_applies_decision_to_processing_attempts() {
        let ledger = sandbox_ledger(0.0);
        let pending = ledger
            .record(AttemptDraft {
                order_id: "order-p".to_string(),
                amount: Decimal::from(75),
                payment_method: "bank_transfer".to_string(),
                status: TransactionStatus::Processing,
                retry_count: 0,
                original_transaction_id: None,
                error: None,
                gateway_response: None,
            })
            .await;

        let rejected = ledger.verify(&pending.transaction_id, false).await.unwrap();
        assert!(!rejected.verified);
        assert_eq!(
            rejected.transaction.status,
            TransactionStatus::VerificationFailed
        );
    }

    #[tokio::test]
    async fn card_charge_completes_and_masks_number() {
        let ledger = sandbox_ledger(0.0);
        let tx = ledger
            .charge_card(&valid_card(), Decimal::from(2500), "order-c")
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        let receipt = tx.gateway_response.unwrap();
        assert!(receipt.gateway_transaction_id.starts_with("CARD"));
        assert!(receipt.reference.starts_with("AUTH-"));
        assert_eq!(receipt.masked_card.as_deref(), Some("**** **** **** 4242"));
    }

    #[tokio::test]
    async fn card_decline_is_recorded_then_raised() {
        let ledger = sandbox_ledger(1.0);
        let err = ledger
            .charge_card(&valid_card(), Decimal::from(2500), "order-d")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::CardDeclined { .. }));

        let attempts = ledger.by_order("order-d").await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, TransactionStatus::Failed);
        assert_eq!(attempts[0].error.as_ref().unwrap().code, "CARD_DECLINED");
    }

    #[tokio::test]
    async fn card_expiring_this_month_is_still_valid() {
        let ledger = sandbox_ledger(0.0);
        let now = Utc::now();
        let details = CardDetails {
            expiry: format!("{:02}/{:02}", now.month(), now.year() % 100),
            ..valid_card()
        };
        let tx = ledger
            .charge_card(&details, Decimal::from(100), "order-e")
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn card_validation_rejects_each_malformed_field() {
        let ledger = sandbox_ledger(0.0);
        let cases: Vec<(CardDetails, &str)> = vec![
            (
                CardDetails {
                    card_number: "4242 4242 4242 4241".to_string(),
                    ..valid_card()
                },
                "Card number is invalid",
            ),
            (
                CardDetails {
                    card_number: "4242".to_string(),
                    ..valid_card()
                },
                "Card number must be 13 to 19 digits",
            ),
            (
                CardDetails {
                    card_number: "4242-abcd-4242-4242".to_string(),
                    ..valid_card()
                },
                "Card number must contain only digits",
            ),
            (
                CardDetails {
                    expiry: "13/30".to_string(),
                    ..valid_card()
                },
                "Card expiry must be in MM/YY format",
            ),
            (
                CardDetails {
                    expiry: "01/20".to_string(),
                    ..valid_card()
                },
                "Card has expired",
            ),
            (
                CardDetails {
                    cvv: "12".to_string(),
                    ..valid_card()
                },
                "CVV must be 3 or 4 digits",
            ),
            (
                CardDetails {
                    holder_name: "  ".to_string(),
                    ..valid_card()
                },
                "Card holder name is required",
            ),
        ];

        for (details, expected) in cases {
            let err = ledger
                .charge_card(&details, Decimal::from(100), "order-bad")
                .await
                .unwrap_err();
            match err {
                PaymentError::Validation { message } => assert_eq!(message, expected),
                other => panic!("unexpected error: {other:?}"),
            }
        }
        // None of the rejected cards may have touched the ledger.
        assert!(ledger.by_order("order-bad").await.is_empty());
    }
}

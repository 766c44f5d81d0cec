//! Recurring payment plans: cadence advancement, due-payment processing
//! with dunning retries, and monthly projection analytics.
//!
//! Due entries for distinct plans are processed concurrently; entries of
//! one plan run in order under that plan's lock so counter updates never
//! race. A failed attempt schedules an independent retry entry instead of
//! sleeping, so dunning never blocks unrelated plans.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dtos::CreateRecurringRequest;
use crate::error::PaymentError;
use crate::models::recurring::{
    RecurringPayment, RecurringStatus, ScheduledPayment, ScheduledStatus,
};
use crate::models::vendor::Vendor;
use crate::services::repository::{RecurringStore, VendorStore};
use crate::services::wallet::WalletLedger;

const MAX_RETRY_DELAY_HOURS: i64 = 168;

/// Aggregate outcome of one `process_due` sweep. A single bad entry never
/// aborts the sweep; it shows up here instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecurringAnalytics {
    pub total_plans: usize,
    pub active_plans: usize,
    pub paused_plans: usize,
    pub completed_plans: usize,
    pub cancelled_plans: usize,
    pub failed_plans: usize,
    /// Approximation: daily plans count as 30 payments a month, weekly as
    /// 4.33, quarterly as 0.33, yearly as 0.083.
    pub projected_monthly_outflow: Decimal,
    pub total_payments: u32,
    pub successful_payments: u32,
    pub failed_payments: u32,
}

pub struct RecurringPaymentScheduler {
    store: Arc<dyn RecurringStore>,
    vendors: Arc<dyn VendorStore>,
    wallet: Arc<WalletLedger>,
    plan_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl RecurringPaymentScheduler {
    pub fn new(
        store: Arc<dyn RecurringStore>,
        vendors: Arc<dyn VendorStore>,
        wallet: Arc<WalletLedger>,
    ) -> Self {
        Self {
            store,
            vendors,
            wallet,
            plan_locks: DashMap::new(),
        }
    }

    pub async fn create(
        &self,
        request: CreateRecurringRequest,
    ) -> Result<RecurringPayment, PaymentError> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        if request.max_retries > 10 {
            return Err(PaymentError::validation("max_retries must be at most 10"));
        }
        if !(1..=168).contains(&request.retry_interval_hours) {
            return Err(PaymentError::validation(
                "retry_interval_hours must be between 1 and 168",
            ));
        }
        if let Some(end) = request.end_date {
            if end <= request.start_date {
                return Err(PaymentError::validation("End date must be after start date"));
            }
        }
        let vendor = self
            .vendors
            .get(request.vendor_id)
            .await
            .ok_or_else(|| PaymentError::not_found("Vendor"))?;

        let plan = self
            .store
            .insert_plan(RecurringPayment {
                id: 0,
                vendor_id: vendor.id,
                amount: request.amount,
                frequency: request.frequency,
                start_date: request.start_date,
                end_date: request.end_date,
                next_payment_date: Some(request.start_date),
                status: RecurringStatus::Active,
                auto_retry: request.auto_retry,
                max_retries: request.max_retries,
                retry_interval_hours: request.retry_interval_hours,
                total_payments: 0,
                successful_payments: 0,
                failed_payments: 0,
                created_at: Utc::now(),
            })
            .await;
        self.store
            .insert_scheduled(ScheduledPayment {
                id: 0,
                recurring_payment_id: plan.id,
                scheduled_at: at_midnight(request.start_date),
                status: ScheduledStatus::Pending,
                retry_count: 0,
                is_retry: false,
            })
            .await;
        tracing::info!(
            plan_id = plan.id,
            vendor = %vendor.name,
            frequency = plan.frequency.as_str(),
            "recurring payment plan created"
        );
        Ok(plan)
    }

    pub async fn pause(&self, id: i64) -> Result<RecurringPayment, PaymentError> {
        self.transition(id, RecurringStatus::Paused, &[RecurringStatus::Active])
            .await
    }

    pub async fn resume(&self, id: i64) -> Result<RecurringPayment, PaymentError> {
        self.transition(id, RecurringStatus::Active, &[RecurringStatus::Paused])
            .await
    }

    pub async fn cancel(&self, id: i64) -> Result<RecurringPayment, PaymentError> {
        self.transition(
            id,
            RecurringStatus::Cancelled,
            &[RecurringStatus::Active, RecurringStatus::Paused],
        )
        .await
    }

    pub async fn get(&self, id: i64) -> Option<RecurringPayment> {
        self.store.get_plan(id).await
    }

    pub async fn list(&self) -> Vec<RecurringPayment> {
        self.store.list_plans().await
    }

    pub async fn schedule_for(&self, plan_id: i64) -> Vec<ScheduledPayment> {
        self.store.scheduled_for_plan(plan_id).await
    }

    pub async fn create_vendor(&self, name: &str) -> Vendor {
        let vendor = self
            .vendors
            .insert(Vendor {
                id: 0,
                name: name.to_string(),
                total_paid: Decimal::ZERO,
                payment_count: 0,
                created_at: Utc::now(),
            })
            .await;
        tracing::info!(vendor_id = vendor.id, name = %vendor.name, "vendor registered");
        vendor
    }

    pub async fn vendor(&self, id: i64) -> Option<Vendor> {
        self.vendors.get(id).await
    }

    pub async fn list_vendors(&self) -> Vec<Vendor> {
        self.vendors.list().await
    }

    /// Settle every pending entry due at `as_of`. Partial failures are
    /// reported per item, never raised for the whole batch.
    pub async fn process_due(&self, as_of: DateTime<Utc>) -> BatchResult {
        let due = self.store.due_scheduled(as_of).await;
        let mut by_plan: HashMap<i64, Vec<ScheduledPayment>> = HashMap::new();
        for entry in due {
            by_plan
                .entry(entry.recurring_payment_id)
                .or_default()
                .push(entry);
        }

        let groups = by_plan
            .into_iter()
            .map(|(plan_id, entries)| self.process_plan_entries(plan_id, entries, as_of));
        let slices = futures::future::join_all(groups).await;

        let mut result = BatchResult::default();
        for slice in slices {
            result.processed += slice.processed;
            result.successful += slice.successful;
            result.failed += slice.failed;
            result.errors.extend(slice.errors);
        }
        result
    }

    /// Move the plan to its next cycle. Anchor at the cycle's nominal date,
    /// not the execution time, so retries do not drift the cadence.
    pub async fn advance(&self, plan: &mut RecurringPayment, from: NaiveDate) {
        let next = plan.frequency.advance_date(from);
        if plan.end_date.is_some_and(|end| next > end) {
            plan.status = RecurringStatus::Completed;
            plan.next_payment_date = None;
            tracing::info!(plan_id = plan.id, "recurring payment plan completed");
            return;
        }
        plan.next_payment_date = Some(next);
        self.store
            .insert_scheduled(ScheduledPayment {
                id: 0,
                recurring_payment_id: plan.id,
                scheduled_at: at_midnight(next),
                status: ScheduledStatus::Pending,
                retry_count: 0,
                is_retry: false,
            })
            .await;
    }

    pub async fn analytics(&self) -> RecurringAnalytics {
        let plans = self.store.list_plans().await;
        let mut analytics = RecurringAnalytics {
            total_plans: plans.len(),
            ..Default::default()
        };
        for plan in &plans {
            match plan.status {
                RecurringStatus::Active => {
                    analytics.active_plans += 1;
                    analytics.projected_monthly_outflow +=
                        plan.amount * plan.frequency.monthly_multiplier();
                }
                RecurringStatus::Paused => analytics.paused_plans += 1,
                RecurringStatus::Completed => analytics.completed_plans += 1,
                RecurringStatus::Cancelled => analytics.cancelled_plans += 1,
                RecurringStatus::Failed => analytics.failed_plans += 1,
            }
            analytics.total_payments += plan.total_payments;
            analytics.successful_payments += plan.successful_payments;
            analytics.failed_payments += plan.failed_payments;
        }
        analytics.projected_monthly_outflow = analytics.projected_monthly_outflow.round_dp(2);
        analytics
    }

    /// Background sweep on a fixed interval until the token fires.
    pub fn spawn_processor(
        self: &Arc<Self>,
        interval: std::time::Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("recurring payment processor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let result = scheduler.process_due(Utc::now()).await;
                        if result.processed > 0 {
                            tracing::info!(
                                processed = result.processed,
                                successful = result.successful,
                                failed = result.failed,
                                "processed due recurring payments"
                            );
                        }
                    }
                }
            }
        })
    }

    async fn process_plan_entries(
        &self,
        plan_id: i64,
        entries: Vec<ScheduledPayment>,
        as_of: DateTime<Utc>,
    ) -> BatchResult {
        let lock = self.plan_lock(plan_id);
        let _guard = lock.lock().await;

        let mut slice = BatchResult::default();
        for entry in entries {
            let Some(plan) = self.store.get_plan(plan_id).await else {
                slice.processed += 1;
                slice.failed += 1;
                slice.errors.push(format!("plan {plan_id}: not found"));
                continue;
            };
            match plan.status {
                RecurringStatus::Active => {}
                // A paused plan keeps its entry pending until resumed.
                RecurringStatus::Paused => continue,
                _ => {
                    // Close out entries orphaned by a terminal plan so they
                    // stop coming back every sweep.
                    let mut orphan = entry;
                    orphan.status = ScheduledStatus::Failed;
                    self.store.update_scheduled(orphan).await;
                    continue;
                }
            }
            slice.processed += 1;
            match self.execute(plan, entry, as_of).await {
                Ok(()) => slice.successful += 1,
                Err(message) => {
                    slice.failed += 1;
                    slice.errors.push(message);
                }
            }
        }
        slice
    }

    async fn execute(
        &self,
        mut plan: RecurringPayment,
        mut entry: ScheduledPayment,
        as_of: DateTime<Utc>,
    ) -> Result<(), String> {
        let reference = format!("recurring:{}:{}", plan.id, entry.id);
        match self.wallet.pay(plan.amount, Some(reference)).await {
            Ok(_) => {
                entry.status = ScheduledStatus::Completed;
                let anchor = plan
                    .next_payment_date
                    .unwrap_or_else(|| entry.scheduled_at.date_naive());
                self.store.update_scheduled(entry).await;
                plan.total_payments += 1;
                plan.successful_payments += 1;
                self.credit_vendor(&plan).await;
                self.advance(&mut plan, anchor).await;
                tracing::info!(plan_id = plan.id, amount = %plan.amount, "recurring payment settled");
                counter!("recurring_payments_total", "outcome" => "success").increment(1);
                self.store.update_plan(plan).await;
                Ok(())
            }
            Err(err) => {
                let retry_count = entry.retry_count;
                entry.status = ScheduledStatus::Failed;
                self.store.update_scheduled(entry).await;
                plan.total_payments += 1;
                plan.failed_payments += 1;
                counter!("recurring_payments_total", "outcome" => "failure").increment(1);
                if plan.auto_retry && retry_count < plan.max_retries {
                    let delay = retry_delay_hours(plan.retry_interval_hours, retry_count);
                    self.store
                        .insert_scheduled(ScheduledPayment {
                            id: 0,
                            recurring_payment_id: plan.id,
                            scheduled_at: as_of + Duration::hours(delay),
                            status: ScheduledStatus::Pending,
                            retry_count: retry_count + 1,
                            is_retry: true,
                        })
                        .await;
                    tracing::warn!(
                        plan_id = plan.id,
                        retry_count = retry_count + 1,
                        delay_hours = delay,
                        "recurring payment failed, retry scheduled"
                    );
                } else {
                    plan.status = RecurringStatus::Failed;
                    plan.next_payment_date = None;
                    tracing::warn!(plan_id = plan.id, "recurring payment retries exhausted");
                }
                let plan_id = plan.id;
                self.store.update_plan(plan).await;
                Err(format!("plan {plan_id}: {err}"))
            }
        }
    }

    async fn credit_vendor(&self, plan: &RecurringPayment) {
        if let Some(mut vendor) = self.vendors.get(plan.vendor_id).await {
            vendor.total_paid += plan.amount;
            vendor.payment_count += 1;
            self.vendors.update(vendor).await;
        }
    }

    async fn transition(
        &self,
        id: i64,
        to: RecurringStatus,
        allowed_from: &[RecurringStatus],
    ) -> Result<RecurringPayment, PaymentError> {
        let lock = self.plan_lock(id);
        let _guard = lock.lock().await;
        let mut plan = self
            .store
            .get_plan(id)
            .await
            .ok_or_else(|| PaymentError::not_found("Recurring payment"))?;
        if !allowed_from.contains(&plan.status) {
            return Err(PaymentError::state(format!(
                "Cannot move a {} plan to {}",
                plan.status.as_str(),
                to.as_str()
            )));
        }
        plan.status = to;
        if to == RecurringStatus::Cancelled {
            plan.next_payment_date = None;
        }
        let updated = self
            .store
            .update_plan(plan)
            .await
            .ok_or_else(|| PaymentError::not_found("Recurring payment"))?;
        tracing::info!(
            plan_id = id,
            status = updated.status.as_str(),
            "recurring payment plan transitioned"
        );
        Ok(updated)
    }

    fn plan_lock(&self, plan_id: i64) -> Arc<Mutex<()>> {
        self.plan_locks.entry(plan_id).or_default().clone()
    }
}

/// Dunning delay doubles with each retry, capped at a week.
fn retry_delay_hours(interval_hours: u32, retry_count: u32) -> i64 {
    i64::from(interval_hours)
        .saturating_mul(1 << retry_count.min(8))
        .min(MAX_RETRY_DELAY_HOURS)
}

fn at_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recurring::Frequency;
    use crate::services::repository::{InMemoryRecurringStore, InMemoryVendorStore};

    struct Rig {
        scheduler: RecurringPaymentScheduler,
        wallet: Arc<WalletLedger>,
    }

    fn rig(balance: i64) -> Rig {
        let wallet = Arc::new(WalletLedger::with_balance(Decimal::from(balance)));
        let scheduler = RecurringPaymentScheduler::new(
            Arc::new(InMemoryRecurringStore::new()),
            Arc::new(InMemoryVendorStore::new()),
            wallet.clone(),
        );
        Rig { scheduler, wallet }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(vendor_id: i64, amount: i64, frequency: Frequency, start: NaiveDate) -> CreateRecurringRequest {
        CreateRecurringRequest {
            vendor_id,
            amount: Decimal::from(amount),
            frequency,
            start_date: start,
            end_date: None,
            auto_retry: true,
            max_retries: 3,
            retry_interval_hours: 24,
        }
    }

    async fn pending_entries(rig: &Rig, plan_id: i64) -> Vec<ScheduledPayment> {
        rig.scheduler
            .schedule_for(plan_id)
            .await
            .into_iter()
            .filter(|e| e.status == ScheduledStatus::Pending)
            .collect()
    }

    #[tokio::test]
    async fn create_validates_vendor_amount_and_dates() {
        let rig = rig(10_000);
        let err = rig
            .scheduler
            .create(request(99, 100, Frequency::Monthly, date(2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }));

        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let err = rig
            .scheduler
            .create(request(vendor.id, 0, Frequency::Monthly, date(2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount));

        let mut bad_dates = request(vendor.id, 100, Frequency::Monthly, date(2024, 5, 10));
        bad_dates.end_date = Some(date(2024, 5, 10));
        let err = rig.scheduler.create(bad_dates).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation { .. }));

        let plan = rig
            .scheduler
            .create(request(vendor.id, 100, Frequency::Monthly, date(2024, 1, 1)))
            .await
            .unwrap();
        assert_eq!(plan.status, RecurringStatus::Active);
        assert_eq!(plan.next_payment_date, Some(date(2024, 1, 1)));
        let pending = pending_entries(&rig, plan.id).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_at, at_midnight(date(2024, 1, 1)));
    }

    #[tokio::test]
    async fn due_payment_settles_and_advances_across_month_end() {
        let rig = rig(10_000);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let plan = rig
            .scheduler
            .create(request(vendor.id, 2_500, Frequency::Monthly, date(2024, 1, 31)))
            .await
            .unwrap();

        let result = rig.scheduler.process_due(at_midnight(date(2024, 1, 31))).await;
        assert_eq!(result.processed, 1);
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 0);

        let plan = rig.scheduler.get(plan.id).await.unwrap();
        assert_eq!(plan.total_payments, 1);
        assert_eq!(plan.successful_payments, 1);
        assert_eq!(plan.next_payment_date, Some(date(2024, 2, 29)));

        let pending = pending_entries(&rig, plan.id).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_at, at_midnight(date(2024, 2, 29)));

        let vendor = rig.scheduler.vendor(vendor.id).await.unwrap();
        assert_eq!(vendor.total_paid, Decimal::from(2_500));
        assert_eq!(vendor.payment_count, 1);
        assert_eq!(rig.wallet.balance().await, Decimal::from(7_500));
    }

    #[tokio::test]
    async fn short_end_date_completes_after_one_cycle() {
        let rig = rig(10_000);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let mut req = request(vendor.id, 100, Frequency::Monthly, date(2024, 3, 10));
        req.end_date = Some(date(2024, 3, 11));
        let plan = rig.scheduler.create(req).await.unwrap();

        let result = rig.scheduler.process_due(at_midnight(date(2024, 3, 10))).await;
        assert_eq!(result.successful, 1);

        let plan = rig.scheduler.get(plan.id).await.unwrap();
        assert_eq!(plan.status, RecurringStatus::Completed);
        assert_eq!(plan.next_payment_date, None);
        assert!(pending_entries(&rig, plan.id).await.is_empty());
    }

    #[tokio::test]
    async fn failed_payment_schedules_doubling_retries() {
        let rig = rig(0);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let plan = rig
            .scheduler
            .create(request(vendor.id, 500, Frequency::Monthly, date(2024, 6, 1)))
            .await
            .unwrap();

        let first_sweep = at_midnight(date(2024, 6, 1));
        let result = rig.scheduler.process_due(first_sweep).await;
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Insufficient"));

        let updated = rig.scheduler.get(plan.id).await.unwrap();
        assert_eq!(updated.status, RecurringStatus::Active);
        assert_eq!(updated.failed_payments, 1);

        let pending = pending_entries(&rig, plan.id).await;
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_retry);
        assert_eq!(pending[0].retry_count, 1);
        assert_eq!(pending[0].scheduled_at, first_sweep + Duration::hours(24));

        // Nothing due before the retry window opens.
        let quiet = rig.scheduler.process_due(first_sweep + Duration::hours(1)).await;
        assert_eq!(quiet.processed, 0);

        // Second failure doubles the delay.
        let second_sweep = first_sweep + Duration::hours(24);
        rig.scheduler.process_due(second_sweep).await;
        let pending = pending_entries(&rig, plan.id).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retry_count, 2);
        assert_eq!(pending[0].scheduled_at, second_sweep + Duration::hours(48));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_plan_without_raising() {
        let rig = rig(0);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let mut req = request(vendor.id, 500, Frequency::Weekly, date(2024, 6, 1));
        req.max_retries = 0;
        let plan = rig.scheduler.create(req).await.unwrap();

        let result = rig.scheduler.process_due(at_midnight(date(2024, 6, 1))).await;
        assert_eq!(result.failed, 1);

        let plan = rig.scheduler.get(plan.id).await.unwrap();
        assert_eq!(plan.status, RecurringStatus::Failed);
        assert_eq!(plan.next_payment_date, None);
        assert!(pending_entries(&rig, plan.id).await.is_empty());
    }

    #[tokio::test]
    async fn paused_plan_keeps_its_entry_until_resumed() {
        let rig = rig(10_000);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let plan = rig
            .scheduler
            .create(request(vendor.id, 100, Frequency::Daily, date(2024, 6, 1)))
            .await
            .unwrap();
        rig.scheduler.pause(plan.id).await.unwrap();

        let result = rig.scheduler.process_due(at_midnight(date(2024, 6, 1))).await;
        assert_eq!(result.processed, 0);
        assert_eq!(pending_entries(&rig, plan.id).await.len(), 1);

        rig.scheduler.resume(plan.id).await.unwrap();
        let result = rig.scheduler.process_due(at_midnight(date(2024, 6, 1))).await;
        assert_eq!(result.successful, 1);
    }

    #[tokio::test]
    async fn cancelled_plan_closes_orphan_entries() {
        let rig = rig(10_000);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let plan = rig
            .scheduler
            .create(request(vendor.id, 100, Frequency::Daily, date(2024, 6, 1)))
            .await
            .unwrap();
        rig.scheduler.cancel(plan.id).await.unwrap();

        let result = rig.scheduler.process_due(at_midnight(date(2024, 6, 2))).await;
        assert_eq!(result.processed, 0);
        assert!(pending_entries(&rig, plan.id).await.is_empty());

        let err = rig.scheduler.resume(plan.id).await.unwrap_err();
        assert!(matches!(err, PaymentError::State { .. }));
    }

    #[tokio::test]
    async fn one_failing_plan_does_not_abort_the_batch() {
        let rig = rig(1_000);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let ok_plan = rig
            .scheduler
            .create(request(vendor.id, 100, Frequency::Daily, date(2024, 6, 1)))
            .await
            .unwrap();
        let broke_plan = rig
            .scheduler
            .create(request(vendor.id, 50_000, Frequency::Daily, date(2024, 6, 1)))
            .await
            .unwrap();

        let result = rig.scheduler.process_due(at_midnight(date(2024, 6, 1))).await;
        assert_eq!(result.processed, 2);
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains(&format!("plan {}", broke_plan.id)));

        assert_eq!(
            rig.scheduler.get(ok_plan.id).await.unwrap().successful_payments,
            1
        );
    }

    #[tokio::test]
    async fn retry_success_does_not_drift_the_cadence() {
        let rig = rig(0);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        let plan = rig
            .scheduler
            .create(request(vendor.id, 500, Frequency::Monthly, date(2024, 1, 31)))
            .await
            .unwrap();

        let first_sweep = at_midnight(date(2024, 1, 31));
        rig.scheduler.process_due(first_sweep).await;

        rig.wallet.deposit(Decimal::from(1_000), None).await.unwrap();
        let result = rig.scheduler.process_due(first_sweep + Duration::hours(24)).await;
        assert_eq!(result.successful, 1);

        // The next cycle anchors at Jan 31, not at the retry timestamp.
        let plan = rig.scheduler.get(plan.id).await.unwrap();
        assert_eq!(plan.next_payment_date, Some(date(2024, 2, 29)));
    }

    #[tokio::test]
    async fn analytics_projects_monthly_outflow_for_active_plans() {
        let rig = rig(10_000);
        let vendor = rig.scheduler.create_vendor("Acme Hosting").await;
        rig.scheduler
            .create(request(vendor.id, 10, Frequency::Daily, date(2024, 6, 1)))
            .await
            .unwrap();
        rig.scheduler
            .create(request(vendor.id, 10, Frequency::Weekly, date(2024, 6, 1)))
            .await
            .unwrap();
        rig.scheduler
            .create(request(vendor.id, 100, Frequency::Monthly, date(2024, 6, 1)))
            .await
            .unwrap();
        let cancelled = rig
            .scheduler
            .create(request(vendor.id, 9_999, Frequency::Monthly, date(2024, 6, 1)))
            .await
            .unwrap();
        rig.scheduler.cancel(cancelled.id).await.unwrap();

        let analytics = rig.scheduler.analytics().await;
        assert_eq!(analytics.total_plans, 4);
        assert_eq!(analytics.active_plans, 3);
        assert_eq!(analytics.cancelled_plans, 1);
        // 10*30 + 10*4.33 + 100*1
        assert_eq!(analytics.projected_monthly_outflow, Decimal::new(44330, 2));
    }

    #[test]
    fn retry_delay_doubles_and_caps_at_a_week() {
        assert_eq!(retry_delay_hours(24, 0), 24);
        assert_eq!(retry_delay_hours(24, 1), 48);
        assert_eq!(retry_delay_hours(24, 2), 96);
        assert_eq!(retry_delay_hours(24, 3), 168);
        assert_eq!(retry_delay_hours(168, 5), 168);
    }
}

//! Store traits and their in-memory implementations.
//!
//! Every ledger and registry mutates state only through one of these traits,
//! so a database-backed store can slot in without touching domain logic.
//! Inserts assign ids from an atomic counter; reads hand out clones, never
//! references into the store.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::audit::AuditEntry;
use crate::models::proof::PaymentProof;
use crate::models::quarantine::QuarantineEntry;
use crate::models::recurring::{RecurringPayment, ScheduledPayment, ScheduledStatus};
use crate::models::transaction::Transaction;
use crate::models::vendor::Vendor;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists the draft, assigning the next numeric id.
    async fn insert(&self, draft: Transaction) -> Transaction;
    async fn update(&self, tx: Transaction) -> Option<Transaction>;
    async fn get_by_transaction_id(&self, transaction_id: &str) -> Option<Transaction>;
    async fn find_by_order(&self, order_id: &str) -> Vec<Transaction>;
    /// Newest-first page plus the total record count.
    async fn list(&self, page: u32, page_size: u32) -> (Vec<Transaction>, usize);
}

#[async_trait]
pub trait ProofStore: Send + Sync {
    async fn insert(&self, draft: PaymentProof) -> PaymentProof;
    async fn update(&self, proof: PaymentProof) -> Option<PaymentProof>;
    async fn get_by_file_name(&self, file_name: &str) -> Option<PaymentProof>;
    /// Resolves either the primary object key or the thumbnail key.
    async fn find_by_object_key(&self, key: &str) -> Option<PaymentProof>;
    async fn list(&self) -> Vec<PaymentProof>;
}

#[async_trait]
pub trait QuarantineStore: Send + Sync {
    async fn insert(&self, draft: QuarantineEntry) -> QuarantineEntry;
    async fn update(&self, entry: QuarantineEntry) -> Option<QuarantineEntry>;
    async fn get(&self, id: i64) -> Option<QuarantineEntry>;
    async fn list(&self) -> Vec<QuarantineEntry>;
}

/// Filters for audit queries. All fields are conjunctive; `None` matches.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    pub file_name: Option<String>,
    pub order_id: Option<String>,
    pub action: Option<String>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, draft: AuditEntry) -> AuditEntry;
    async fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry>;
}

#[async_trait]
pub trait RecurringStore: Send + Sync {
    async fn insert_plan(&self, draft: RecurringPayment) -> RecurringPayment;
    async fn update_plan(&self, plan: RecurringPayment) -> Option<RecurringPayment>;
    async fn get_plan(&self, id: i64) -> Option<RecurringPayment>;
    async fn list_plans(&self) -> Vec<RecurringPayment>;
    async fn insert_scheduled(&self, draft: ScheduledPayment) -> ScheduledPayment;
    async fn update_scheduled(&self, entry: ScheduledPayment) -> Option<ScheduledPayment>;
    /// Pending entries with `scheduled_at <= as_of`, oldest first.
    async fn due_scheduled(&self, as_of: DateTime<Utc>) -> Vec<ScheduledPayment>;
    async fn scheduled_for_plan(&self, plan_id: i64) -> Vec<ScheduledPayment>;
}

#[async_trait]
pub trait VendorStore: Send + Sync {
    async fn insert(&self, draft: Vendor) -> Vendor;
    async fn update(&self, vendor: Vendor) -> Option<Vendor>;
    async fn get(&self, id: i64) -> Option<Vendor>;
    async fn list(&self) -> Vec<Vendor>;
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Default)]
pub struct InMemoryTransactionStore {
    counter: AtomicI64,
    items: DashMap<i64, Transaction>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, mut draft: Transaction) -> Transaction {
        draft.id = next_id(&self.counter);
        self.items.insert(draft.id, draft.clone());
        draft
    }

    async fn update(&self, tx: Transaction) -> Option<Transaction> {
        if !self.items.contains_key(&tx.id) {
            return None;
        }
        self.items.insert(tx.id, tx.clone());
        Some(tx)
    }

    async fn get_by_transaction_id(&self, transaction_id: &str) -> Option<Transaction> {
        self.items
            .iter()
            .find(|entry| entry.value().transaction_id == transaction_id)
            .map(|entry| entry.value().clone())
    }

    async fn find_by_order(&self, order_id: &str) -> Vec<Transaction> {
        let mut matches: Vec<Transaction> = self
            .items
            .iter()
            .filter(|entry| entry.value().order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|tx| tx.id);
        matches
    }

    async fn list(&self, page: u32, page_size: u32) -> (Vec<Transaction>, usize) {
        let mut all: Vec<Transaction> = self.items.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|tx| std::cmp::Reverse(tx.id));
        let total = all.len();
        let page = page.max(1);
        let page_size = page_size.max(1);
        // Computed in usize so a huge page number runs off the end instead
        // of overflowing u32.
        let start = ((page - 1) as usize).saturating_mul(page_size as usize);
        let page_items = all.into_iter().skip(start).take(page_size as usize).collect();
        (page_items, total)
    }
}

#[derive(Default)]
pub struct InMemoryProofStore {
    counter: AtomicI64,
    items: DashMap<i64, PaymentProof>,
}

impl InMemoryProofStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProofStore for InMemoryProofStore {
    async fn insert(&self, mut draft: PaymentProof) -> PaymentProof {
        draft.id = next_id(&self.counter);
        self.items.insert(draft.id, draft.clone());
        draft
    }

    async fn update(&self, proof: PaymentProof) -> Option<PaymentProof> {
        if !self.items.contains_key(&proof.id) {
            return None;
        }
        self.items.insert(proof.id, proof.clone());
        Some(proof)
    }

    async fn get_by_file_name(&self, file_name: &str) -> Option<PaymentProof> {
        self.items
            .iter()
            .find(|entry| entry.value().file_name == file_name)
            .map(|entry| entry.value().clone())
    }

    async fn find_by_object_key(&self, key: &str) -> Option<PaymentProof> {
        self.items
            .iter()
            .find(|entry| {
                let proof = entry.value();
                proof.storage_key == key || proof.thumbnail_key == key
            })
            .map(|entry| entry.value().clone())
    }

    async fn list(&self) -> Vec<PaymentProof> {
        let mut all: Vec<PaymentProof> = self.items.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|proof| proof.id);
        all
    }
}

#[derive(Default)]
pub struct InMemoryQuarantineStore {
    counter: AtomicI64,
    items: DashMap<i64, QuarantineEntry>,
}

impl InMemoryQuarantineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuarantineStore for InMemoryQuarantineStore {
    async fn insert(&self, mut draft: QuarantineEntry) -> QuarantineEntry {
        draft.id = next_id(&self.counter);
        self.items.insert(draft.id, draft.clone());
        draft
    }

    async fn update(&self, entry: QuarantineEntry) -> Option<QuarantineEntry> {
        if !self.items.contains_key(&entry.id) {
            return None;
        }
        self.items.insert(entry.id, entry.clone());
        Some(entry)
    }

    async fn get(&self, id: i64) -> Option<QuarantineEntry> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    async fn list(&self) -> Vec<QuarantineEntry> {
        let mut all: Vec<QuarantineEntry> = self.items.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|entry| entry.id);
        all
    }
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    counter: AtomicI64,
    items: DashMap<i64, AuditEntry>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, mut draft: AuditEntry) -> AuditEntry {
        draft.id = next_id(&self.counter);
        self.items.insert(draft.id, draft.clone());
        draft
    }

    async fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let mut matches: Vec<AuditEntry> = self
            .items
            .iter()
            .map(|e| e.value().clone())
            .filter(|entry| {
                filter.from.map_or(true, |from| entry.timestamp >= from)
                    && filter.to.map_or(true, |to| entry.timestamp <= to)
                    && filter
                        .actor
                        .as_deref()
                        .map_or(true, |actor| entry.actor == actor)
                    && filter
                        .file_name
                        .as_deref()
                        .map_or(true, |name| entry.file_name.as_deref() == Some(name))
                    && filter
                        .order_id
                        .as_deref()
                        .map_or(true, |order| entry.order_id.as_deref() == Some(order))
                    && filter
                        .action
                        .as_deref()
                        .map_or(true, |action| entry.action == action)
            })
            .collect();
        matches.sort_by_key(|entry| entry.id);
        matches
    }
}

#[derive(Default)]
pub struct InMemoryRecurringStore {
    plan_counter: AtomicI64,
    scheduled_counter: AtomicI64,
    plans: DashMap<i64, RecurringPayment>,
    scheduled: DashMap<i64, ScheduledPayment>,
}

impl InMemoryRecurringStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecurringStore for InMemoryRecurringStore {
    async fn insert_plan(&self, mut draft: RecurringPayment) -> RecurringPayment {
        draft.id = next_id(&self.plan_counter);
        self.plans.insert(draft.id, draft.clone());
        draft
    }

    async fn update_plan(&self, plan: RecurringPayment) -> Option<RecurringPayment> {
        if !self.plans.contains_key(&plan.id) {
            return None;
        }
        self.plans.insert(plan.id, plan.clone());
        Some(plan)
    }

    async fn get_plan(&self, id: i64) -> Option<RecurringPayment> {
        self.plans.get(&id).map(|entry| entry.value().clone())
    }

    async fn list_plans(&self) -> Vec<RecurringPayment> {
        let mut all: Vec<RecurringPayment> =
            self.plans.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|plan| plan.id);
        all
    }

    async fn insert_scheduled(&self, mut draft: ScheduledPayment) -> ScheduledPayment {
        draft.id = next_id(&self.scheduled_counter);
        self.scheduled.insert(draft.id, draft.clone());
        draft
    }

    async fn update_scheduled(&self, entry: ScheduledPayment) -> Option<ScheduledPayment> {
        if !self.scheduled.contains_key(&entry.id) {
            return None;
        }
        self.scheduled.insert(entry.id, entry.clone());
        Some(entry)
    }

    async fn due_scheduled(&self, as_of: DateTime<Utc>) -> Vec<ScheduledPayment> {
        let mut due: Vec<ScheduledPayment> = self
            .scheduled
            .iter()
            .filter(|entry| {
                let item = entry.value();
                item.status == ScheduledStatus::Pending && item.scheduled_at <= as_of
            })
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|item| (item.scheduled_at, item.id));
        due
    }

    async fn scheduled_for_plan(&self, plan_id: i64) -> Vec<ScheduledPayment> {
        let mut matches: Vec<ScheduledPayment> = self
            .scheduled
            .iter()
            .filter(|entry| entry.value().recurring_payment_id == plan_id)
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|item| item.id);
        matches
    }
}

#[derive(Default)]
pub struct InMemoryVendorStore {
    counter: AtomicI64,
    items: DashMap<i64, Vendor>,
}

impl InMemoryVendorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VendorStore for InMemoryVendorStore {
    async fn insert(&self, mut draft: Vendor) -> Vendor {
        draft.id = next_id(&self.counter);
        self.items.insert(draft.id, draft.clone());
        draft
    }

    async fn update(&self, vendor: Vendor) -> Option<Vendor> {
        if !self.items.contains_key(&vendor.id) {
            return None;
        }
        self.items.insert(vendor.id, vendor.clone());
        Some(vendor)
    }

    async fn get(&self, id: i64) -> Option<Vendor> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    async fn list(&self) -> Vec<Vendor> {
        let mut all: Vec<Vendor> = self.items.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|vendor| vendor.id);
        all
    }
}

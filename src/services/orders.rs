use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::entities::order::{self, Entity as OrderEntity, Model as OrderModel};
use crate::errors::ServiceError;

/// Partial order update. Only `Some` fields are written; everything else
/// on the row is preserved (merge semantics).
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub email: Option<String>,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub payment_status: Option<String>,
    pub status: Option<String>,
    pub processing_status: Option<String>,
    pub iccid: Option<String>,
    pub reseller_order_id: Option<String>,
    pub provider_order_id: Option<String>,
    pub provider_payload: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub tracking_info: Option<String>,
    pub payment_created_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
}

/// Storage interface for the order projection.
///
/// The listing path is an O(n) scan by design; keeping it behind this
/// trait lets a server-side query replace it later without touching the
/// webhook or admin handlers.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<OrderModel>, ServiceError>;

    /// Merge the patch into the order, creating the row if it does not
    /// exist yet (webhook-first flows create orders this way).
    async fn upsert_merge(&self, id: &str, patch: OrderPatch) -> Result<OrderModel, ServiceError>;

    /// Merge the patch into an existing order; `NotFound` if absent.
    async fn merge_existing(
        &self,
        id: &str,
        patch: OrderPatch,
    ) -> Result<OrderModel, ServiceError>;

    /// All orders, newest first, optionally filtered by exact status.
    async fn fetch_by_status(&self, status: Option<&str>)
        -> Result<Vec<OrderModel>, ServiceError>;
}

fn apply_patch(model: &mut order::ActiveModel, patch: OrderPatch, now: DateTime<Utc>) {
    if let Some(v) = patch.email {
        model.email = Set(Some(v));
    }
    if let Some(v) = patch.plan_id {
        model.plan_id = Set(Some(v));
    }
    if let Some(v) = patch.plan_name {
        model.plan_name = Set(Some(v));
    }
    if let Some(v) = patch.amount {
        model.amount = Set(Some(v));
    }
    if let Some(v) = patch.currency {
        model.currency = Set(Some(v));
    }
    if let Some(v) = patch.payment_method {
        model.payment_method = Set(Some(v));
    }
    if let Some(v) = patch.payment_status {
        model.payment_status = Set(Some(v));
    }
    if let Some(v) = patch.status {
        model.status = Set(Some(v));
    }
    if let Some(v) = patch.processing_status {
        model.processing_status = Set(Some(v));
    }
    if let Some(v) = patch.iccid {
        model.iccid = Set(Some(v));
    }
    if let Some(v) = patch.reseller_order_id {
        model.reseller_order_id = Set(Some(v));
    }
    if let Some(v) = patch.provider_order_id {
        model.provider_order_id = Set(Some(v));
    }
    if let Some(v) = patch.provider_payload {
        model.provider_payload = Set(Some(v));
    }
    if let Some(v) = patch.notes {
        model.notes = Set(Some(v));
    }
    if let Some(v) = patch.tracking_info {
        model.tracking_info = Set(Some(v));
    }
    if let Some(v) = patch.payment_created_at {
        model.payment_created_at = Set(Some(v));
    }
    if let Some(v) = patch.payment_confirmed_at {
        model.payment_confirmed_at = Set(Some(v));
    }
    model.updated_at = Set(Some(now));
}

/// Production store backed by sea-orm.
pub struct SeaOrmOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// A connection-level failure means the backing store is not
    /// reachable/configured; callers surface that as 503, not 500.
    fn map_db_err(err: DbErr) -> ServiceError {
        match err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
                ServiceError::ServiceUnavailable("order store is not available".to_string())
            }
            other => ServiceError::DatabaseError(other),
        }
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    async fn get(&self, id: &str) -> Result<Option<OrderModel>, ServiceError> {
        OrderEntity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(Self::map_db_err)
    }

    async fn upsert_merge(&self, id: &str, patch: OrderPatch) -> Result<OrderModel, ServiceError> {
        let now = Utc::now();
        let existing = self.get(id).await?;
        let inserting = existing.is_none();

        let mut active: order::ActiveModel = match existing {
            Some(model) => model.into(),
            None => order::ActiveModel {
                id: Set(id.to_string()),
                created_at: Set(now),
                ..Default::default()
            },
        };

        apply_patch(&mut active, patch, now);

        let saved = if inserting {
            active.insert(self.db.as_ref()).await
        } else {
            active.update(self.db.as_ref()).await
        }
        .map_err(Self::map_db_err)?;

        Ok(saved)
    }

    async fn merge_existing(
        &self,
        id: &str,
        patch: OrderPatch,
    ) -> Result<OrderModel, ServiceError> {
        let model = self
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let mut active: order::ActiveModel = model.into();
        apply_patch(&mut active, patch, Utc::now());

        active.update(self.db.as_ref()).await.map_err(Self::map_db_err)
    }

    async fn fetch_by_status(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        query.all(self.db.as_ref()).await.map_err(Self::map_db_err)
    }
}

/// In-memory store used in development and tests.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, OrderModel>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blank(id: &str, now: DateTime<Utc>) -> OrderModel {
        OrderModel {
            id: id.to_string(),
            email: None,
            plan_id: None,
            plan_name: None,
            amount: None,
            currency: None,
            payment_method: None,
            payment_status: None,
            status: None,
            processing_status: None,
            iccid: None,
            reseller_order_id: None,
            provider_order_id: None,
            provider_payload: None,
            notes: None,
            tracking_info: None,
            created_at: now,
            updated_at: None,
            payment_created_at: None,
            payment_confirmed_at: None,
        }
    }

    fn merge_into(model: &mut OrderModel, patch: OrderPatch, now: DateTime<Utc>) {
        if let Some(v) = patch.email {
            model.email = Some(v);
        }
        if let Some(v) = patch.plan_id {
            model.plan_id = Some(v);
        }
        if let Some(v) = patch.plan_name {
            model.plan_name = Some(v);
        }
        if let Some(v) = patch.amount {
            model.amount = Some(v);
        }
        if let Some(v) = patch.currency {
            model.currency = Some(v);
        }
        if let Some(v) = patch.payment_method {
            model.payment_method = Some(v);
        }
        if let Some(v) = patch.payment_status {
            model.payment_status = Some(v);
        }
        if let Some(v) = patch.status {
            model.status = Some(v);
        }
        if let Some(v) = patch.processing_status {
            model.processing_status = Some(v);
        }
        if let Some(v) = patch.iccid {
            model.iccid = Some(v);
        }
        if let Some(v) = patch.reseller_order_id {
            model.reseller_order_id = Some(v);
        }
        if let Some(v) = patch.provider_order_id {
            model.provider_order_id = Some(v);
        }
        if let Some(v) = patch.provider_payload {
            model.provider_payload = Some(v);
        }
        if let Some(v) = patch.notes {
            model.notes = Some(v);
        }
        if let Some(v) = patch.tracking_info {
            model.tracking_info = Some(v);
        }
        if let Some(v) = patch.payment_created_at {
            model.payment_created_at = Some(v);
        }
        if let Some(v) = patch.payment_confirmed_at {
            model.payment_confirmed_at = Some(v);
        }
        model.updated_at = Some(now);
    }

    /// Seed an order directly, bypassing merge bookkeeping (tests).
    pub async fn seed(&self, model: OrderModel) {
        self.orders.write().await.insert(model.id.clone(), model);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &str) -> Result<Option<OrderModel>, ServiceError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn upsert_merge(&self, id: &str, patch: OrderPatch) -> Result<OrderModel, ServiceError> {
        let now = Utc::now();
        let mut orders = self.orders.write().await;
        let model = orders
            .entry(id.to_string())
            .or_insert_with(|| Self::blank(id, now));
        Self::merge_into(model, patch, now);
        Ok(model.clone())
    }

    async fn merge_existing(
        &self,
        id: &str,
        patch: OrderPatch,
    ) -> Result<OrderModel, ServiceError> {
        let mut orders = self.orders.write().await;
        let model = orders
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        Self::merge_into(model, patch, Utc::now());
        Ok(model.clone())
    }

    async fn fetch_by_status(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        let orders = self.orders.read().await;
        let mut items: Vec<OrderModel> = orders
            .values()
            .filter(|o| match status {
                Some(s) => o.status.as_deref() == Some(s),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

/// One page of the admin order listing.
#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderModel>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// Whitelisted admin update: status, notes and tracking info only.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AdminOrderUpdate {
    pub id: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tracking_info: Option<String>,
}

/// Read/update operations over the order projection.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn OrderStore> {
        self.store.clone()
    }

    /// List orders: exact status filter at the store, then a
    /// case-insensitive substring search across email/id/ICCID in memory,
    /// then the page slice. Full scan per call, fine at current scale.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        search: Option<&str>,
        status: Option<&str>,
    ) -> Result<OrderPage, ServiceError> {
        let page = page.max(1);
        let limit = limit.max(1);

        let status_filter = status.filter(|s| !s.is_empty() && *s != "all");
        let mut orders = self.store.fetch_by_status(status_filter).await?;

        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let needle = term.to_lowercase();
            orders.retain(|order| {
                let email = order.email.as_deref().unwrap_or("").to_lowercase();
                let id = order.id.to_lowercase();
                let iccid = order.iccid.as_deref().unwrap_or("").to_lowercase();
                email.contains(&needle) || id.contains(&needle) || iccid.contains(&needle)
            });
        }

        let total = orders.len() as u64;
        let total_pages = total.div_ceil(limit);
        // Saturate on absurd page numbers so they yield an empty page
        // instead of wrapping.
        let skip = page.saturating_sub(1).saturating_mul(limit);
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let orders: Vec<OrderModel> = orders.into_iter().skip(skip).take(limit as usize).collect();

        Ok(OrderPage {
            orders,
            page,
            limit,
            total,
            total_pages,
        })
    }

    /// Merge the whitelisted admin fields into an order.
    #[instrument(skip(self, update))]
    pub async fn admin_update(&self, update: AdminOrderUpdate) -> Result<(), ServiceError> {
        let id = update
            .id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::ValidationError("Order ID is required".to_string()))?;

        let patch = OrderPatch {
            status: update.status,
            notes: update.notes,
            tracking_info: update.tracking_info,
            ..Default::default()
        };

        self.store.merge_existing(id, patch).await?;
        info!(order_id = id, "order updated");
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer order record.
///
/// The id is an opaque identifier assigned by the storefront at checkout
/// time; every write after creation is a merge that only touches the
/// provided columns.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub email: Option<String>,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,

    /// Payment method tag: stripe, coinbase, lemonsqueezy
    pub payment_method: Option<String>,
    /// pending | confirmed | failed | refunded
    pub payment_status: Option<String>,
    /// Admin-facing order status (e.g. active)
    pub status: Option<String>,
    /// Downstream provisioning state (completed once the eSIM is issued)
    pub processing_status: Option<String>,

    pub iccid: Option<String>,
    /// Order id at the mobile-data reseller, set once provisioned
    pub reseller_order_id: Option<String>,
    /// Charge/session/order id at the payment provider
    pub provider_order_id: Option<String>,
    /// Raw provider payload from the most recent webhook
    #[sea_orm(column_type = "Json", nullable)]
    pub provider_payload: Option<Json>,

    pub notes: Option<String>,
    pub tracking_info: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub payment_created_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One credential document per payment/reseller provider.
///
/// `secrets` is a JSON object of named values (`live_secret_key`,
/// `api_key`, `store_id`, `webhook_secret`, ...). Rows are written by an
/// out-of-band admin process; the application only reads them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "provider_credentials")]
pub struct Model {
    /// Provider name: stripe | coinbase | lemonsqueezy | airalo
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider: String,

    #[sea_orm(column_type = "Json")]
    pub secrets: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}

//! Cached USD price quote for one external asset id.

use sea_orm::entity::prelude::*;

/// Price quote model. One row per asset id.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "price_quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub asset_id: String,
    #[sea_orm(column_type = "Decimal(Some((38, 12)))")]
    pub price_usd: Decimal,
    pub fetched_at: TimeDateTime,
}

/// Price quote model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

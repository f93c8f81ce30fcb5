//! Declarative role-gating rule.
//!
//! The stored row is wide with nullable columns; the in-memory value
//! used by the evaluator is the [`RuleSpec`] sum type carrying only
//! the fields relevant to its kind. Rules targeting the same role
//! compose disjunctively.

use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Gating rule model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "gating_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub role_id: i64,
    pub kind: RuleKind,
    pub enabled: bool,
    pub mint: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((38, 12)))", nullable)]
    pub threshold_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((38, 12)))", nullable)]
    pub threshold_usd: Option<Decimal>,
    pub price_source: Option<PriceSource>,
    pub price_asset_id: Option<String>,
    pub collection_address: Option<String>,
    pub threshold_count: Option<i64>,
    pub created_by: i64,
    pub created_at: TimeDateTime,
    pub updated_at: TimeDateTime,
}

/// Discriminant of the rule variant stored in a row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[sea_orm(num_value = 0)]
    TokenAmount,
    #[sea_orm(num_value = 1)]
    TokenUsd,
    #[sea_orm(num_value = 2)]
    NftCollection,
}

/// External quote provider for USD-denominated rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    #[sea_orm(num_value = 0)]
    Coingecko,
}

/// Gating rule model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::guild::Entity",
        from = "Column::GuildId",
        to = "super::guild::Column::Id"
    )]
    Guild,
}

impl Related<super::guild::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Guild.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// In-memory rule variant carrying only the fields relevant to its kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleSpec {
    TokenAmount {
        mint: String,
        threshold_amount: Decimal,
    },
    TokenUsd {
        mint: String,
        threshold_usd: Decimal,
        price_asset_id: String,
    },
    NftCollection {
        collection_address: String,
        threshold_count: u64,
    },
}

/// A stored row is missing a column its kind requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteRule {
    pub rule_id: i64,
    pub missing: &'static str,
}

impl std::fmt::Display for IncompleteRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule {} is missing column {}", self.rule_id, self.missing)
    }
}

impl std::error::Error for IncompleteRule {}

impl Model {
    /// Narrow the wide row down to its in-memory rule variant.
    pub fn spec(&self) -> Result<RuleSpec, IncompleteRule> {
        let missing = |missing| IncompleteRule {
            rule_id: self.id,
            missing,
        };

        match self.kind {
            RuleKind::TokenAmount => Ok(RuleSpec::TokenAmount {
                mint: self.mint.clone().ok_or(missing("mint"))?,
                threshold_amount: self.threshold_amount.ok_or(missing("threshold_amount"))?,
            }),
            RuleKind::TokenUsd => Ok(RuleSpec::TokenUsd {
                mint: self.mint.clone().ok_or(missing("mint"))?,
                threshold_usd: self.threshold_usd.ok_or(missing("threshold_usd"))?,
                price_asset_id: self
                    .price_asset_id
                    .clone()
                    .ok_or(missing("price_asset_id"))?,
            }),
            RuleKind::NftCollection => Ok(RuleSpec::NftCollection {
                collection_address: self
                    .collection_address
                    .clone()
                    .ok_or(missing("collection_address"))?,
                threshold_count: self.threshold_count.ok_or(missing("threshold_count"))? as u64,
            }),
        }
    }
}

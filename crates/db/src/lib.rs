//! # Database models and interaction utilities
//!
//! This crate provides definitions for database models that can be used, in conjunction
//! with [`sea_orm`], to interact with the database in a typed manner.
//!
//! Additionally, this crate provides with utilities to map transaction errors ([`TransactionErrorExt::into_raw_result`])
//! and the cross-process scheduled cycle lock ([`lock::RunLock`]).

pub mod audit_entry;
pub mod gating_rule;
pub mod guild;
pub mod lock;
pub mod price_quote;
pub mod verify_session;
pub mod wallet_link;

use std::error::Error;

pub use sea_orm::{
    self, prelude::Decimal, sea_query, ActiveModelTrait, ActiveValue, ColumnTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    TransactionError, TransactionTrait,
};
pub use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Current UTC time as a timezone-less database timestamp.
pub fn now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();

    PrimitiveDateTime::new(now.date(), now.time())
}

/// Utility methods for operating with transaction errors.
pub trait TransactionErrorExt<T, E> {
    /// Convert transaction [`Result`] into a [`Result`] with a custom error.
    fn into_raw_result(self) -> Result<T, E>;
}

impl<T, E> TransactionErrorExt<T, E> for Result<T, TransactionError<E>>
where
    E: Error + From<DbErr>,
{
    fn into_raw_result(self) -> Result<T, E> {
        match self {
            Ok(val) => Ok(val),
            Err(TransactionError::Connection(err)) => Err(err.into()),
            Err(TransactionError::Transaction(err)) => Err(err),
        }
    }
}

//! SQLite persistence layer for chronicle
//!
//! One append-only table of chat turns. The schema is ensured at connect;
//! no update or delete operation is exposed.

pub mod store;

pub use store::{ChatTurn, MessageStore, TurnRole};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

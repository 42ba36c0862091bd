pub mod memory;

use thiserror::Error;

use crate::models::order::{NewOrder, Order, StatusPatch};
use crate::models::profile::{CourierProfile, Restaurant, UserProfile};

/// A storage-level failure. Surfaced to the caller as an error, never as a
/// false success; the engine does not retry on its own.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Accessor over persisted order records. The only part of the engine that
/// touches durable state; everything else is rebuilt from it on reconnect.
pub trait OrderDirectory: Send + Sync {
    /// Inserts a new row with `pending`/`pending` statuses and returns it.
    fn insert(&self, new_order: NewOrder) -> Result<Order, DirectoryError>;

    fn get(&self, order_id: i64) -> Result<Option<Order>, DirectoryError>;

    /// Applies the patch atomically with partial-field semantics: an
    /// unspecified field keeps its own prior value.
    fn update_status(
        &self,
        order_id: i64,
        patch: StatusPatch,
    ) -> Result<Option<Order>, DirectoryError>;

    /// Atomic check-and-set: succeeds only while `delivery_status` is still
    /// `preparing`, setting the partner, a fresh verification code, and
    /// advancing the status to `accepted` in one step. `Ok(None)` means the
    /// guard failed (another courier won, or the order is gone) and nothing
    /// was written.
    fn assign_courier(
        &self,
        order_id: i64,
        courier_id: i64,
        verification_code: &str,
    ) -> Result<Option<Order>, DirectoryError>;

    /// The courier's current `out_for_delivery` order, if any.
    fn find_active_delivery(&self, courier_id: i64) -> Result<Option<Order>, DirectoryError>;
}

/// Read access to actor profiles. Profile ownership lives outside this
/// service; the engine only consumes lookups.
pub trait ProfileDirectory: Send + Sync {
    fn restaurant(&self, id: i64) -> Result<Option<Restaurant>, DirectoryError>;
    fn user(&self, id: i64) -> Result<Option<UserProfile>, DirectoryError>;
    fn courier(&self, id: i64) -> Result<Option<CourierProfile>, DirectoryError>;
    fn available_couriers(&self) -> Result<Vec<CourierProfile>, DirectoryError>;
}

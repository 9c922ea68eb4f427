//! Listing boosts purchased through checkout.
//!
//! The boost row itself is created by the marketplace side before payment;
//! the core only flips it to `active` when the paying event arrives.
//! Activation is idempotent by nature (setting a status twice is a no-op)
//! but still runs at most once per event via the event-store claim.

use uuid::Uuid;

/// Which surface a boost promotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "boost_scope")]
pub enum BoostScope {
    Marketplace,
    Garage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "boost_status")]
pub enum BoostStatus {
    Pending,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Boost {
    pub boost_id: Uuid,
    pub scope: BoostScope,
    pub status: BoostStatus,
    pub created_at: time::OffsetDateTime,
    pub activated_at: Option<time::OffsetDateTime>,
}

/// Data for registering a pending boost (collaborator-facing).
#[derive(Debug, Clone)]
pub struct NewBoost {
    pub boost_id: Uuid,
    pub scope: BoostScope,
}

/// Outcome of an activation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    AlreadyActive,
    NotFound,
}

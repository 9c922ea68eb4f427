//! Postgres store adapter.
//!
//! Uniqueness constraints are the concurrency guards:
//!
//! * `processed_events.external_id` (primary key) makes the claim atomic —
//!   concurrent duplicate deliveries cannot both win the insert.
//! * `wallet_transactions.idempotency_key` (unique) serializes accidental
//!   concurrent duplicate credits; the loser of the insert race rolls back
//!   its balance update and reports the winner's row.
//! * `offer_redemptions (offer_id, user_id)` (primary key) makes redemption
//!   recording idempotent in its own domain.
//!
//! Multi-statement operations run inside a single transaction, so a crash
//! mid-operation leaves nothing half-applied.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::boost::{ActivationOutcome, Boost, NewBoost};
use crate::entities::order::{NewOrder, Order, OrderLookup, TransitionOutcome};
use crate::entities::processed_event::{ClaimOutcome, DeadLetter, EventState, ProcessedEvent};
use crate::entities::redemption::{NewRedemption, RedemptionOutcome};
use crate::entities::wallet::{NewLedgerEntry, Wallet, WalletTransaction};
use crate::entities::{EventKind, OrderStatus, OwnerType};

use super::{LedgerApply, Store, StoreError};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "order_id, status, amount, provider_payment_ref, created_at, updated_at";
const WALLET_COLUMNS: &str = "wallet_id, owner_type, owner_id, currency, balance, created_at";
const TRANSACTION_COLUMNS: &str = "transaction_id, wallet_id, amount, ref_type, ref_id, purpose, \
     idempotency_key, balance_after, created_at";
const BOOST_COLUMNS: &str = "boost_id, scope, status, created_at, activated_at";

/// Row shape shared by the dead-letter queries.
#[derive(Debug, sqlx::FromRow)]
struct DeadLetterRow {
    external_id: String,
    kind: EventKind,
    payload: serde_json::Value,
    park_reason: Option<String>,
    claimed_at: time::OffsetDateTime,
    parked_at: Option<time::OffsetDateTime>,
}

impl From<DeadLetterRow> for DeadLetter {
    fn from(row: DeadLetterRow) -> Self {
        DeadLetter {
            external_id: row.external_id,
            kind: row.kind,
            payload: row.payload,
            reason: row.park_reason.unwrap_or_default(),
            parked_at: row.parked_at.unwrap_or(row.claimed_at),
        }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn claim_event(
        &self,
        external_id: &str,
        kind: EventKind,
        payload_hash: &str,
        payload: &serde_json::Value,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        // Insert wins for a fresh id; the conflict arm only takes over a
        // stale pending claim (crashed worker). Everything else conflicts
        // without returning a row.
        let claimed: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO processed_events
                (external_id, kind, state, payload_hash, payload, received_at, claimed_at)
            VALUES ($1, $2, 'pending', $3, $4, now(), now())
            ON CONFLICT (external_id) DO UPDATE
                SET claimed_at = now(), payload = EXCLUDED.payload
                WHERE processed_events.state = 'pending'
                  AND processed_events.claimed_at < now() - make_interval(secs => $5)
            RETURNING external_id
            "#,
        )
        .bind(external_id)
        .bind(kind)
        .bind(payload_hash)
        .bind(payload)
        .bind(stale_after.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        if claimed.is_some() {
            return Ok(ClaimOutcome::Claimed);
        }

        let state: Option<EventState> =
            sqlx::query_scalar("SELECT state FROM processed_events WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match state {
            Some(EventState::Processed) => ClaimOutcome::AlreadyProcessed,
            Some(EventState::DeadLetter) => ClaimOutcome::Parked,
            Some(EventState::Pending) => ClaimOutcome::InFlight,
            // The claim row vanished between the two statements (a concurrent
            // worker released it); the provider will redeliver.
            None => ClaimOutcome::InFlight,
        })
    }

    async fn mark_event_processed(&self, external_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE processed_events
            SET state = 'processed', processed_at = now(), payload = NULL, park_reason = NULL
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_event(&self, external_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM processed_events WHERE external_id = $1 AND state = 'pending'")
            .bind(external_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn park_event(&self, external_id: &str, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE processed_events
            SET state = 'dead_letter', parked_at = now(), park_reason = $2
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reopen_dead_letter(
        &self,
        external_id: &str,
    ) -> Result<Option<DeadLetter>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<DeadLetterRow> = sqlx::query_as(
            r#"
            SELECT external_id, kind, payload, park_reason, claimed_at, parked_at
            FROM processed_events
            WHERE external_id = $1 AND state = 'dead_letter' AND payload IS NOT NULL
            FOR UPDATE
            "#,
        )
        .bind(external_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE processed_events
            SET state = 'pending', claimed_at = now(), parked_at = NULL, park_reason = NULL
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn find_event(&self, external_id: &str) -> Result<Option<ProcessedEvent>, StoreError> {
        let event = sqlx::query_as::<_, ProcessedEvent>(
            r#"
            SELECT external_id, kind, state, payload_hash, payload,
                   received_at, claimed_at, processed_at, parked_at, park_reason
            FROM processed_events
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_dead_letters(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeadLetter>, StoreError> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT external_id, kind, payload, park_reason, claimed_at, parked_at
            FROM processed_events
            WHERE state = 'dead_letter' AND payload IS NOT NULL
            ORDER BY parked_at DESC NULLS LAST
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DeadLetter::from).collect())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let inserted = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (order_id, status, amount, created_at, updated_at)
            VALUES ($1, 'pending', $2, now(), now())
            ON CONFLICT (order_id) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.order_id)
        .bind(order.amount)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok(record);
        }
        // Registration is idempotent: a repeat returns the existing row.
        let existing =
            sqlx::query_as::<_, Order>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
            ))
            .bind(order.order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(existing)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn transition_order(
        &self,
        lookup: &OrderLookup,
        target: OrderStatus,
        provider_ref: Option<&str>,
    ) -> Result<TransitionOutcome, StoreError> {
        let Some(predecessor) = OrderStatus::valid_predecessor(target) else {
            // `pending` cannot be entered by transition.
            return match self.lookup_order(lookup).await? {
                Some(order) => Ok(TransitionOutcome::Illegal {
                    current: order.status,
                }),
                None => Ok(TransitionOutcome::NotFound),
            };
        };

        let (filter, key): (&str, String) = match lookup {
            OrderLookup::ById(id) => ("order_id = $1", id.to_string()),
            OrderLookup::ByProviderRef(provider) => {
                ("provider_payment_ref = $1", provider.clone())
            }
        };

        // Predecessor check and update in one atomic statement.
        let sql = format!(
            r#"
            UPDATE orders
            SET status = $2,
                provider_payment_ref = COALESCE($3, provider_payment_ref),
                updated_at = now()
            WHERE {filter} AND status = $4
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let query = match lookup {
            OrderLookup::ById(id) => sqlx::query_as::<_, Order>(&sql).bind(*id),
            OrderLookup::ByProviderRef(_) => sqlx::query_as::<_, Order>(&sql).bind(key),
        };
        let updated = query
            .bind(target)
            .bind(provider_ref)
            .bind(predecessor)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(order) = updated {
            return Ok(TransitionOutcome::Applied(order));
        }

        match self.lookup_order(lookup).await? {
            None => Ok(TransitionOutcome::NotFound),
            Some(order) if order.status == target => Ok(TransitionOutcome::AlreadyInTarget(order)),
            Some(order) => Ok(TransitionOutcome::Illegal {
                current: order.status,
            }),
        }
    }

    async fn find_or_create_wallet(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        let inserted = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            INSERT INTO wallets (wallet_id, owner_type, owner_id, currency, balance, created_at)
            VALUES ($1, $2, $3, $4, 0, now())
            ON CONFLICT (owner_type, owner_id) DO NOTHING
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(owner_type)
        .bind(owner_id)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(wallet) = inserted {
            return Ok(wallet);
        }
        let existing = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE owner_type = $1 AND owner_id = $2"
        ))
        .bind(owner_type)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(existing)
    }

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE wallet_id = $1"
        ))
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(wallet)
    }

    async fn apply_ledger_entry(
        &self,
        entry: NewLedgerEntry,
        default_owner: (OwnerType, Uuid),
        currency: &str,
    ) -> Result<LedgerApply, StoreError> {
        let key = entry.idempotency_key();

        if let Some(prior) = self.transaction_by_key(&key).await? {
            return Ok(LedgerApply::Duplicate(prior));
        }

        let mut tx = self.pool.begin().await?;

        if entry.amount >= 0 {
            // Lazy wallet creation on first credit.
            let (owner_type, owner_id) = default_owner;
            sqlx::query(
                r#"
                INSERT INTO wallets (wallet_id, owner_type, owner_id, currency, balance, created_at)
                VALUES ($1, $2, $3, $4, 0, now())
                ON CONFLICT (wallet_id) DO NOTHING
                "#,
            )
            .bind(entry.wallet_id)
            .bind(owner_type)
            .bind(owner_id)
            .bind(currency)
            .execute(&mut *tx)
            .await?;
        }

        // The row lock taken here serializes concurrent applies to the same
        // wallet; the balance check rides on the same statement.
        let balance_after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE wallets
            SET balance = balance + $2
            WHERE wallet_id = $1 AND (balance + $2 >= 0 OR owner_type = 'system')
            RETURNING balance
            "#,
        )
        .bind(entry.wallet_id)
        .bind(entry.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance_after) = balance_after else {
            drop(tx);
            let balance: Option<i64> =
                sqlx::query_scalar("SELECT balance FROM wallets WHERE wallet_id = $1")
                    .bind(entry.wallet_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Ok(match balance {
                Some(balance) => LedgerApply::InsufficientFunds { balance },
                None => LedgerApply::WalletNotFound,
            });
        };

        let inserted = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            INSERT INTO wallet_transactions
                ({TRANSACTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(entry.wallet_id)
        .bind(entry.amount)
        .bind(entry.ref_type)
        .bind(&entry.ref_id)
        .bind(&entry.purpose)
        .bind(&key)
        .bind(balance_after)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(transaction) => {
                tx.commit().await?;
                Ok(LedgerApply::Applied(transaction))
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost the insert race to a concurrent duplicate; rolling
                // back undoes our balance update and the winner's row stands.
                drop(tx);
                match self.transaction_by_key(&key).await? {
                    Some(prior) => Ok(LedgerApply::Duplicate(prior)),
                    None => Err(StoreError::Database(e)),
                }
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<Vec<Wallet>, StoreError> {
        let wallets = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets ORDER BY created_at ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(wallets)
    }

    async fn wallet_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, StoreError> {
        let rows = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(wallet_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn record_redemption(
        &self,
        redemption: NewRedemption,
    ) -> Result<RedemptionOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO offer_redemptions (offer_id, user_id, meta, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (offer_id, user_id) DO NOTHING
            "#,
        )
        .bind(redemption.offer_id)
        .bind(redemption.user_id)
        .bind(&redemption.meta)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(RedemptionOutcome::AlreadyRedeemed)
        } else {
            Ok(RedemptionOutcome::Recorded)
        }
    }

    async fn create_boost(&self, boost: NewBoost) -> Result<Boost, StoreError> {
        let inserted = sqlx::query_as::<_, Boost>(&format!(
            r#"
            INSERT INTO boosts (boost_id, scope, status, created_at)
            VALUES ($1, $2, 'pending', now())
            ON CONFLICT (boost_id) DO NOTHING
            RETURNING {BOOST_COLUMNS}
            "#
        ))
        .bind(boost.boost_id)
        .bind(boost.scope)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok(record);
        }
        let existing = sqlx::query_as::<_, Boost>(&format!(
            "SELECT {BOOST_COLUMNS} FROM boosts WHERE boost_id = $1"
        ))
        .bind(boost.boost_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(existing)
    }

    async fn activate_boost(&self, boost_id: Uuid) -> Result<ActivationOutcome, StoreError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE boosts
            SET status = 'active', activated_at = COALESCE(activated_at, now())
            WHERE boost_id = $1 AND status <> 'active'
            RETURNING boost_id
            "#,
        )
        .bind(boost_id)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(ActivationOutcome::Activated);
        }
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT boost_id FROM boosts WHERE boost_id = $1")
                .bind(boost_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(match exists {
            Some(_) => ActivationOutcome::AlreadyActive,
            None => ActivationOutcome::NotFound,
        })
    }
}

impl PgStore {
    async fn lookup_order(&self, lookup: &OrderLookup) -> Result<Option<Order>, StoreError> {
        let order = match lookup {
            OrderLookup::ById(id) => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
                ))
                .bind(*id)
                .fetch_optional(&self.pool)
                .await?
            }
            OrderLookup::ByProviderRef(provider) => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE provider_payment_ref = $1 LIMIT 1"
                ))
                .bind(provider)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(order)
    }

    async fn transaction_by_key(
        &self,
        key: &str,
    ) -> Result<Option<WalletTransaction>, StoreError> {
        let prior = sqlx::query_as::<_, WalletTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(prior)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

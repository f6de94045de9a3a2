//! Plans, subscriptions and payments

use chrono::{DateTime, Utc};
use mta_common::tier::{Entitlement, SubscriptionStatus};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};
use std::str::FromStr;

use super::{localized, new_id, parsed};

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: String,
    pub code: String,
    pub tier: Tier,
    pub name: LocalizedText,
    pub price_cents: i64,
    pub currency: String,
    pub duration_days: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Plan {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            tier: parsed(row, "tier")?,
            name: localized(row, "name")?,
            price_cents: row.try_get("price_cents")?,
            currency: row.try_get("currency")?,
            duration_days: row.try_get("duration_days")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn active_plans(pool: &SqlitePool) -> sqlx::Result<Vec<Plan>> {
    sqlx::query_as("SELECT * FROM plans WHERE active = 1 ORDER BY tier, price_cents")
        .fetch_all(pool)
        .await
}

pub async fn get_plan(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Plan>> {
    sqlx::query_as("SELECT * FROM plans WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Plan by id or code
pub async fn find_plan(pool: &SqlitePool, key: &str) -> sqlx::Result<Option<Plan>> {
    sqlx::query_as("SELECT * FROM plans WHERE id = ? OR code = ? LIMIT 1")
        .bind(key)
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn update_plan(
    pool: &SqlitePool,
    id: &str,
    price_cents: Option<i64>,
    active: Option<bool>,
) -> sqlx::Result<Option<Plan>> {
    let result = sqlx::query(
        "UPDATE plans SET price_cents = COALESCE(?, price_cents), active = COALESCE(?, active) WHERE id = ?",
    )
    .bind(price_cents)
    .bind(active)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_plan(pool, id).await
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Subscription {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_id: row.try_get("plan_id")?,
            tier: parsed(row, "tier")?,
            status: parsed(row, "status")?,
            started_at: row.try_get("started_at")?,
            expires_at: row.try_get("expires_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Subscription {
    pub fn entitlement(&self) -> Entitlement {
        Entitlement {
            tier: self.tier,
            status: self.status,
            expires_at: self.expires_at,
        }
    }
}

/// Newest first
pub async fn for_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<Subscription>> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = ? ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Subscriptions that may still grant access
pub async fn entitlements(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<Entitlement>> {
    let subs: Vec<Subscription> = sqlx::query_as(
        "SELECT * FROM subscriptions WHERE user_id = ? AND status IN ('active', 'cancelled')",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(subs.iter().map(Subscription::entitlement).collect())
}

/// Mark the user's active subscriptions cancelled; returns how many changed
pub async fn cancel_active(pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET status = 'cancelled', cancelled_at = ?, updated_at = ?
        WHERE user_id = ? AND status = 'active' AND expires_at > ?
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Subscriptions still granting access although `expires_at` has passed
pub async fn due_for_expiry(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<Vec<Subscription>> {
    sqlx::query_as(
        "SELECT * FROM subscriptions WHERE status IN ('active', 'cancelled') AND expires_at <= ?",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Returns false when another worker already expired it
pub async fn mark_expired(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE subscriptions SET status = 'expired', updated_at = ? WHERE id = ? AND status IN ('active', 'cancelled')",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paypal,
    Maib,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Paypal => "paypal",
            PaymentProvider::Maib => "maib",
        }
    }
}

impl FromStr for PaymentProvider {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paypal" => Ok(PaymentProvider::Paypal),
            "maib" => Ok(PaymentProvider::Maib),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown payment provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown payment status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub provider: PaymentProvider,
    pub order_reference: String,
    pub provider_reference: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, SqliteRow> for Payment {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_id: row.try_get("plan_id")?,
            provider: parsed(row, "provider")?,
            order_reference: row.try_get("order_reference")?,
            provider_reference: row.try_get("provider_reference")?,
            amount_cents: row.try_get("amount_cents")?,
            currency: row.try_get("currency")?,
            status: parsed(row, "status")?,
            subscription_id: row.try_get("subscription_id")?,
            created_at: row.try_get("created_at")?,
            settled_at: row.try_get("settled_at")?,
        })
    }
}

/// Pending payment priced from the plan
pub async fn create_payment(
    pool: &SqlitePool,
    user_id: &str,
    plan: &Plan,
    provider: PaymentProvider,
) -> sqlx::Result<Payment> {
    let id = new_id();
    let order_reference = format!("MTA-{}", uuid::Uuid::new_v4().simple());

    sqlx::query(
        r#"
        INSERT INTO payments (id, user_id, plan_id, provider, order_reference, amount_cents, currency, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(&plan.id)
    .bind(provider.as_str())
    .bind(&order_reference)
    .bind(plan.price_cents)
    .bind(&plan.currency)
    .bind(mta_common::time::now())
    .execute(pool)
    .await?;

    get_payment(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_payment(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Payment>> {
    sqlx::query_as("SELECT * FROM payments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_payment_by_reference(pool: &SqlitePool, order_reference: &str) -> sqlx::Result<Option<Payment>> {
    sqlx::query_as("SELECT * FROM payments WHERE order_reference = ?")
        .bind(order_reference)
        .fetch_optional(pool)
        .await
}

/// Pending → failed; false when the payment was already settled
pub async fn mark_payment_failed(
    pool: &SqlitePool,
    id: &str,
    provider_reference: Option<&str>,
    now: DateTime<Utc>,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = 'failed', provider_reference = COALESCE(?, provider_reference), settled_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(provider_reference)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Settle a pending payment as paid and grant its plan
///
/// Runs in one transaction. The `status = 'pending'` guard makes this a
/// no-op (returns `None`) for a payment that was already settled, so the
/// subscription is extended at most once per payment.
pub async fn settle_paid(
    pool: &SqlitePool,
    payment_id: &str,
    provider_reference: Option<&str>,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<Subscription>> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        UPDATE payments
        SET status = 'paid', provider_reference = COALESCE(?, provider_reference), settled_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(provider_reference)
    .bind(now)
    .bind(payment_id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let (user_id, plan_id): (String, String) =
        sqlx::query_as("SELECT user_id, plan_id FROM payments WHERE id = ?")
            .bind(payment_id)
            .fetch_one(&mut *tx)
            .await?;
    let plan: Plan = sqlx::query_as("SELECT * FROM plans WHERE id = ?")
        .bind(&plan_id)
        .fetch_one(&mut *tx)
        .await?;

    let subscription_id = grant_plan(&mut tx, &user_id, &plan, now).await?;

    sqlx::query("UPDATE payments SET subscription_id = ? WHERE id = ?")
        .bind(&subscription_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

    let subscription: Subscription = sqlx::query_as("SELECT * FROM subscriptions WHERE id = ?")
        .bind(&subscription_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(subscription))
}

/// Extend a live subscription of the plan's tier, or start a new one
async fn grant_plan(
    conn: &mut SqliteConnection,
    user_id: &str,
    plan: &Plan,
    now: DateTime<Utc>,
) -> sqlx::Result<String> {
    let current: Option<Subscription> = sqlx::query_as(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = ? AND tier = ? AND status IN ('active', 'cancelled') AND expires_at > ?
        ORDER BY expires_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(plan.tier.as_str())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(current) = current {
        let expires_at = mta_common::time::add_days(current.expires_at, plan.duration_days);
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET expires_at = ?, status = 'active', cancelled_at = NULL, plan_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(expires_at)
        .bind(&plan.id)
        .bind(now)
        .bind(&current.id)
        .execute(&mut *conn)
        .await?;
        return Ok(current.id);
    }

    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, user_id, plan_id, tier, status, started_at, expires_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'active', ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(&plan.id)
    .bind(plan.tier.as_str())
    .bind(now)
    .bind(mta_common::time::add_days(now, plan.duration_days))
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

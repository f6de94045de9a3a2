//! Plans, subscriptions, checkout and the payment webhook

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use mta_common::webhook::{self, WebhookError};
use mta_common::Tier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::auth::{AdminUser, CurrentUser};
use crate::db::subscriptions::{self, Payment, PaymentProvider, PaymentStatus, Plan, Subscription};
use crate::error::{ApiError, ApiResult};
use crate::services::billing::{self, Settlement};
use crate::AppState;

/// GET /api/plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
    Ok(Json(subscriptions::active_plans(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct PlanUpdate {
    pub price_cents: Option<i64>,
    pub active: Option<bool>,
}

/// PUT /api/admin/plans/:id
pub async fn update_plan(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<PlanUpdate>,
) -> ApiResult<Json<Plan>> {
    if matches!(req.price_cents, Some(price) if price < 0) {
        return Err(ApiError::BadRequest("price_cents must not be negative".to_string()));
    }
    let plan = subscriptions::update_plan(&state.db, &id, req.price_cents, req.active)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Plan not found: {}", id)))?;
    info!("Plan {} updated by {}", plan.code, admin.user.id);
    Ok(Json(plan))
}

#[derive(Debug, Serialize)]
pub struct MySubscriptions {
    pub effective_tier: Tier,
    pub active: Vec<Subscription>,
    pub history: Vec<Subscription>,
}

/// GET /api/subscriptions/me
pub async fn my_subscriptions(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<MySubscriptions>> {
    let now = mta_common::time::now();
    let history = subscriptions::for_user(&state.db, &session.user.id).await?;
    let active = history
        .iter()
        .filter(|s| s.status.grants_access() && s.expires_at > now)
        .cloned()
        .collect();

    Ok(Json(MySubscriptions {
        effective_tier: session.tier,
        active,
        history,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: String,
    pub provider: PaymentProvider,
}

/// POST /api/subscriptions/checkout
///
/// Creates a pending payment; the provider reports the outcome through the webhook.
pub async fn checkout(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let plan = subscriptions::find_plan(&state.db, &req.plan_id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| ApiError::NotFound(format!("Plan not found: {}", req.plan_id)))?;

    let payment = subscriptions::create_payment(&state.db, &session.user.id, &plan, req.provider).await?;
    info!(
        "Checkout {} for {} via {}: {} {}",
        payment.order_reference,
        session.user.id,
        req.provider.as_str(),
        payment.amount_cents,
        payment.currency
    );
    Ok((StatusCode::CREATED, Json(payment)))
}

#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub payment: Payment,
    pub subscription: Option<Subscription>,
    pub changed: bool,
}

impl From<Settlement> for SettlementResponse {
    fn from(s: Settlement) -> Self {
        Self {
            payment: s.payment,
            subscription: s.subscription,
            changed: s.changed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookNotice {
    order_reference: String,
    status: PaymentStatus,
    provider_reference: Option<String>,
}

fn webhook_error(e: WebhookError) -> ApiError {
    match e {
        WebhookError::Disabled => ApiError::Forbidden(e.to_string()),
        WebhookError::MissingField(_) => ApiError::BadRequest(e.to_string()),
        WebhookError::InvalidTimestamp { .. } | WebhookError::InvalidSignature => {
            ApiError::Unauthorized(e.to_string())
        }
    }
}

/// POST /api/payments/webhook
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SettlementResponse>> {
    let secret = state.webhook_secret.as_deref().unwrap_or_default();
    if let Err(e) = webhook::verify(&body, secret, mta_common::time::now_ms()) {
        warn!("Rejected payment webhook: {}", e);
        return Err(webhook_error(e));
    }

    let notice: WebhookNotice =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("Invalid webhook body: {}", e)))?;
    let payment = subscriptions::find_payment_by_reference(&state.db, &notice.order_reference)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Unknown order reference: {}", notice.order_reference)))?;

    let settlement =
        billing::apply_status(&state, &payment, notice.status, notice.provider_reference.as_deref()).await?;
    Ok(Json(settlement.into()))
}

/// POST /api/admin/payments/:id/confirm
pub async fn confirm_payment(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SettlementResponse>> {
    let payment = subscriptions::get_payment(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Payment not found: {}", id)))?;
    info!("Payment {} confirmed manually by {}", payment.order_reference, admin.user.id);
    let settlement = billing::settle_paid(&state, &payment, None).await?;
    Ok(Json(settlement.into()))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: u64,
}

/// POST /api/subscriptions/me/cancel
///
/// Cancelled subscriptions keep granting access until they expire.
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<CancelResponse>> {
    let cancelled = subscriptions::cancel_active(&state.db, &session.user.id, mta_common::time::now()).await?;
    if cancelled == 0 {
        return Err(ApiError::NotFound("No active subscription".to_string()));
    }
    info!("User {} cancelled {} subscriptions", session.user.id, cancelled);
    billing::push_tier(&state, &session.user.id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/admin/plans/:id", put(update_plan))
        .route("/api/subscriptions/me", get(my_subscriptions))
        .route("/api/subscriptions/me/cancel", post(cancel))
        .route("/api/subscriptions/checkout", post(checkout))
        .route("/api/payments/webhook", post(payment_webhook))
        .route("/api/admin/payments/:id/confirm", post(confirm_payment))
}

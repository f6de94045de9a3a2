//! Payment settlement and subscription change notices

use chrono::{DateTime, Utc};
use mta_common::events::RealtimeEvent;
use mta_common::LocalizedText;
use tracing::{info, warn};

use crate::db::notifications::NotificationKind;
use crate::db::subscriptions::{self, Payment, PaymentStatus, Plan, Subscription};
use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::realtime::Room;
use crate::services::{access, notifier};
use crate::AppState;

use super::notifier::Notice;

/// Outcome of applying a provider result to a payment
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment: Payment,
    pub subscription: Option<Subscription>,
    /// False for a re-delivery of an already settled payment
    pub changed: bool,
}

/// Mark a payment paid and grant its plan, at most once
pub async fn settle_paid(
    state: &AppState,
    payment: &Payment,
    provider_reference: Option<&str>,
) -> ApiResult<Settlement> {
    let now = mta_common::time::now();
    let granted = subscriptions::settle_paid(&state.db, &payment.id, provider_reference, now).await?;
    let current = reload(state, &payment.id).await?;

    let Some(subscription) = granted else {
        info!("Payment {} already settled as {:?}", payment.order_reference, current.status);
        let subscription = match &current.subscription_id {
            Some(id) => subscriptions::for_user(&state.db, &current.user_id)
                .await?
                .into_iter()
                .find(|s| &s.id == id),
            None => None,
        };
        return Ok(Settlement {
            payment: current,
            subscription,
            changed: false,
        });
    };

    info!(
        "Payment {} settled; subscription {} active until {}",
        payment.order_reference, subscription.id, subscription.expires_at
    );

    let plan = subscriptions::get_plan(&state.db, &payment.plan_id).await?;
    let notice = activation_notice(plan.as_ref(), subscription.expires_at);
    notifier::send(state, &payment.user_id, &notice).await?;
    push_tier(state, &payment.user_id).await?;

    Ok(Settlement {
        payment: current,
        subscription: Some(subscription),
        changed: true,
    })
}

/// Mark a pending payment failed
pub async fn settle_failed(
    state: &AppState,
    payment: &Payment,
    provider_reference: Option<&str>,
) -> ApiResult<Settlement> {
    let now = mta_common::time::now();
    let changed = subscriptions::mark_payment_failed(&state.db, &payment.id, provider_reference, now).await?;
    let current = reload(state, &payment.id).await?;

    if changed {
        warn!("Payment {} failed", payment.order_reference);
        let notice = Notice::new(
            NotificationKind::Subscription,
            LocalizedText::new("Платёж не прошёл", "Plata a eșuat"),
            LocalizedText::new(
                "Оплата не была подтверждена. Подписка не изменилась.",
                "Plata nu a fost confirmată. Abonamentul nu s-a schimbat.",
            ),
        )
        .with_link("/subscriptions");
        notifier::send(state, &payment.user_id, &notice).await?;
        push_tier(state, &payment.user_id).await?;
    }

    Ok(Settlement {
        payment: current,
        subscription: None,
        changed,
    })
}

async fn reload(state: &AppState, payment_id: &str) -> ApiResult<Payment> {
    subscriptions::get_payment(&state.db, payment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))
}

fn activation_notice(plan: Option<&Plan>, expires_at: DateTime<Utc>) -> Notice {
    let date = expires_at.format("%Y-%m-%d");
    let (name_ru, name_ro) = match plan {
        Some(plan) => (plan.name.get(mta_common::Locale::Ru), plan.name.get(mta_common::Locale::Ro)),
        None => ("", ""),
    };
    Notice::new(
        NotificationKind::Subscription,
        LocalizedText::new("Подписка активна", "Abonament activ"),
        LocalizedText::new(
            format!("{} действует до {}", name_ru, date).trim().to_string(),
            format!("{} este valabil până la {}", name_ro, date).trim().to_string(),
        ),
    )
    .with_link("/subscriptions")
}

/// Push the user's current tier to their room
pub async fn push_tier(state: &AppState, user_id: &str) -> ApiResult<usize> {
    let now = mta_common::time::now();
    let Some(user) = users::find_by_id(&state.db, user_id).await? else {
        return Ok(0);
    };
    let entitlements = subscriptions::entitlements(&state.db, user_id).await?;
    let tier = mta_common::tier::effective_tier(user.role, &entitlements, now);
    let expires_at = access::access_until(&entitlements, tier, now);

    Ok(state.hub.publish(
        &Room::User(user_id.to_string()),
        RealtimeEvent::SubscriptionChanged { tier, expires_at },
    ))
}

/// Apply a provider status string
pub async fn apply_status(
    state: &AppState,
    payment: &Payment,
    status: PaymentStatus,
    provider_reference: Option<&str>,
) -> ApiResult<Settlement> {
    match status {
        PaymentStatus::Paid => settle_paid(state, payment, provider_reference).await,
        PaymentStatus::Failed => settle_failed(state, payment, provider_reference).await,
        PaymentStatus::Pending => Err(ApiError::BadRequest("Status must be paid or failed".to_string())),
    }
}

//! Periodic housekeeping: subscription expiry, event reminders, session cleanup
//!
//! Each pass also re-reads the `settings` table. The generator model and the
//! pass interval itself are fixed at startup.

use chrono::{DateTime, Utc};
use mta_common::LocalizedText;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::db::notifications::NotificationKind;
use crate::db::{schedule, sessions, subscriptions};
use crate::error::ApiResult;
use crate::services::billing;
use crate::services::notifier::{self, Notice};
use crate::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub settings_reloaded: bool,
    pub subscriptions_expired: usize,
    pub reminders_sent: usize,
    pub sessions_removed: u64,
    pub rooms_pruned: usize,
}

/// One housekeeping pass at `now`
pub async fn run_once(state: &AppState, now: DateTime<Utc>) -> ApiResult<MaintenanceReport> {
    let mut report = MaintenanceReport {
        settings_reloaded: state.reload_settings().await?,
        ..MaintenanceReport::default()
    };

    for subscription in subscriptions::due_for_expiry(&state.db, now).await? {
        if !subscriptions::mark_expired(&state.db, &subscription.id, now).await? {
            continue;
        }
        report.subscriptions_expired += 1;

        let notice = Notice::new(
            NotificationKind::Subscription,
            LocalizedText::new("Подписка истекла", "Abonamentul a expirat"),
            LocalizedText::new(
                "Срок действия подписки закончился. Продлите её, чтобы сохранить доступ.",
                "Abonamentul a expirat. Reînnoiți-l pentru a păstra accesul.",
            ),
        )
        .with_link("/subscriptions");
        notifier::send(state, &subscription.user_id, &notice).await?;
        billing::push_tier(state, &subscription.user_id).await?;
    }

    let lead = state.settings().schedule_reminder_minutes;
    for event in schedule::due_reminders(&state.db, now, lead).await? {
        if !schedule::claim_reminder(&state.db, &event.id).await? {
            continue;
        }
        let registrants = schedule::registrant_ids(&state.db, &event.id).await?;
        let time = event.starts_at.format("%Y-%m-%d %H:%M UTC");
        let notice = Notice::new(
            NotificationKind::Schedule,
            LocalizedText::new(
                format!("Скоро начало: {}", event.title.get(mta_common::Locale::Ru)),
                format!("Începe în curând: {}", event.title.get(mta_common::Locale::Ro)),
            ),
            LocalizedText::new(format!("Начало в {}", time), format!("Începe la {}", time)),
        )
        .with_link(format!("/schedule/{}", event.id));
        report.reminders_sent += notifier::send_many(state, &registrants, &notice).await?;
    }

    report.sessions_removed = sessions::delete_expired(&state.db, now).await?;
    report.rooms_pruned = state.hub.prune();

    Ok(report)
}

/// Run [`run_once`] every `maintenance_interval_secs` until the runtime stops
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.settings().maintenance_interval_secs);
    info!("Maintenance task every {:?}", period);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match run_once(&state, mta_common::time::now()).await {
                Ok(report) if report != MaintenanceReport::default() => info!("Maintenance: {:?}", report),
                Ok(_) => debug!("Maintenance: nothing to do"),
                Err(e) => error!("Maintenance pass failed: {}", e),
            }
        }
    })
}

//! Tier gate

use chrono::{DateTime, Utc};
use mta_common::tier::{self, Entitlement};
use mta_common::{Role, Tier};
use sqlx::SqlitePool;

use crate::db::subscriptions;
use crate::error::{ApiError, ApiResult};

/// Effective tier of a user at `now`
pub async fn effective_tier(pool: &SqlitePool, user_id: &str, role: Role, now: DateTime<Utc>) -> sqlx::Result<Tier> {
    if role == Role::Admin {
        return Ok(Tier::Premium);
    }
    let entitlements = subscriptions::entitlements(pool, user_id).await?;
    Ok(tier::effective_tier(role, &entitlements, now))
}

/// Latest expiry among entitlements that grant `tier` at `now`
pub fn access_until(entitlements: &[Entitlement], tier: Tier, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    entitlements
        .iter()
        .filter(|e| e.tier == tier && e.status.grants_access() && e.expires_at > now)
        .map(|e| e.expires_at)
        .max()
}

pub fn ensure_access(viewer: Tier, required: Tier) -> ApiResult<()> {
    if tier::can_access(viewer, required) {
        Ok(())
    } else {
        Err(ApiError::UpgradeRequired { required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_common::tier::SubscriptionStatus;

    #[test]
    fn test_ensure_access() {
        assert!(ensure_access(Tier::Premium, Tier::Basic).is_ok());
        assert!(ensure_access(Tier::Free, Tier::Free).is_ok());
        assert!(matches!(
            ensure_access(Tier::Basic, Tier::Premium),
            Err(ApiError::UpgradeRequired { required: Tier::Premium })
        ));
    }

    #[test]
    fn test_access_until_picks_latest_live_expiry() {
        let now = mta_common::time::now();
        let entitlements = vec![
            Entitlement {
                tier: Tier::Basic,
                status: SubscriptionStatus::Active,
                expires_at: now + chrono::Duration::days(3),
            },
            Entitlement {
                tier: Tier::Basic,
                status: SubscriptionStatus::Cancelled,
                expires_at: now + chrono::Duration::days(10),
            },
            Entitlement {
                tier: Tier::Premium,
                status: SubscriptionStatus::Expired,
                expires_at: now + chrono::Duration::days(30),
            },
        ];

        assert_eq!(
            access_until(&entitlements, Tier::Basic, now),
            Some(now + chrono::Duration::days(10))
        );
        assert_eq!(access_until(&entitlements, Tier::Premium, now), None);
    }
}

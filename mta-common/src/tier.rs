//! Subscription tiers and user roles
//!
//! Tier comparison is the single access gate for content: a viewer sees an
//! item when their tier is at least the item's access level.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription level, ordered Free < Basic < Premium
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "premium" => Ok(Tier::Premium),
            other => Err(Error::InvalidInput(format!("Unknown tier: {}", other))),
        }
    }
}

impl TryFrom<String> for Tier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whether a viewer of `viewer` tier may see content requiring `required`
pub fn can_access(viewer: Tier, required: Tier) -> bool {
    viewer >= required
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lifecycle of a subscription record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    /// Renewal stopped by the user; access continues until expiry
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Whether a subscription in this state still grants its tier
    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Cancelled)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(Error::InvalidInput(format!("Unknown subscription status: {}", other))),
        }
    }
}

impl TryFrom<String> for SubscriptionStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Minimal view of a subscription needed to compute the effective tier
#[derive(Debug, Clone, Copy)]
pub struct Entitlement {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub expires_at: DateTime<Utc>,
}

/// Effective tier of a user at `now`
///
/// Admins are always Premium. Otherwise the highest tier among entitlements
/// that still grant access and have not expired, or Free.
pub fn effective_tier(role: Role, entitlements: &[Entitlement], now: DateTime<Utc>) -> Tier {
    if role == Role::Admin {
        return Tier::Premium;
    }

    entitlements
        .iter()
        .filter(|e| e.status.grants_access() && e.expires_at > now)
        .map(|e| e.tier)
        .max()
        .unwrap_or(Tier::Free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Free < Tier::Basic);
        assert!(Tier::Basic < Tier::Premium);
        assert!(can_access(Tier::Premium, Tier::Basic));
        assert!(can_access(Tier::Basic, Tier::Basic));
        assert!(!can_access(Tier::Free, Tier::Basic));
        assert!(can_access(Tier::Free, Tier::Free));
    }

    #[test]
    fn test_tier_parse_case_insensitive() {
        assert_eq!("PREMIUM".parse::<Tier>().unwrap(), Tier::Premium);
        assert_eq!(" basic ".parse::<Tier>().unwrap(), Tier::Basic);
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Basic).unwrap(), "\"basic\"");
        let t: Tier = serde_json::from_str("\"premium\"").unwrap();
        assert_eq!(t, Tier::Premium);
    }

    #[test]
    fn test_effective_tier_admin_is_premium() {
        assert_eq!(effective_tier(Role::Admin, &[], Utc::now()), Tier::Premium);
    }

    #[test]
    fn test_effective_tier_picks_highest_unexpired() {
        let now = Utc::now();
        let entitlements = [
            Entitlement {
                tier: Tier::Premium,
                status: SubscriptionStatus::Active,
                expires_at: now - Duration::days(1),
            },
            Entitlement {
                tier: Tier::Basic,
                status: SubscriptionStatus::Cancelled,
                expires_at: now + Duration::days(3),
            },
        ];
        assert_eq!(effective_tier(Role::Student, &entitlements, now), Tier::Basic);
    }

    #[test]
    fn test_effective_tier_ignores_expired_status() {
        let now = Utc::now();
        let entitlements = [Entitlement {
            tier: Tier::Premium,
            status: SubscriptionStatus::Expired,
            expires_at: now + Duration::days(3),
        }];
        assert_eq!(effective_tier(Role::Student, &entitlements, now), Tier::Free);
    }
}

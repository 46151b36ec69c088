use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::StorefrontError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Checking,
    Checked,
    Approved,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Checking => "Checking",
            OrderStatus::Checked => "Checked",
            OrderStatus::Approved => "Approved",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checking" => Ok(OrderStatus::Checking),
            "checked" => Ok(OrderStatus::Checked),
            "approved" => Ok(OrderStatus::Approved),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(StorefrontError::validation(format!(
                "Unknown order status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(StorefrontError::validation(format!("Unknown gender: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub gender: Gender,
    pub phone_number: String,
    pub telegram_username: String,
    pub design_types: Vec<String>,
    pub game: String,
    #[serde(default)]
    pub message: String,
    pub total_price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub status: OrderStatus,
    /// RFC 3339
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl Order {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Global,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub created_at: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub created_at: String,
}

/// `blocked_until` 為毫秒時間戳，-1 代表永久封鎖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatus {
    pub is_blocked: bool,
    pub blocked_until: i64,
}

impl BlockStatus {
    pub const PERMANENT: i64 = -1;

    pub fn permanent() -> Self {
        Self {
            is_blocked: true,
            blocked_until: Self::PERMANENT,
        }
    }

    pub fn until(timestamp_ms: i64) -> Self {
        Self {
            is_blocked: true,
            blocked_until: timestamp_ms,
        }
    }

    pub fn lifted() -> Self {
        Self {
            is_blocked: false,
            blocked_until: 0,
        }
    }

    pub fn is_active(&self, now_ms: i64) -> bool {
        self.is_blocked && (self.blocked_until == Self::PERMANENT || now_ms < self.blocked_until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: String,
    pub is_owner: bool,
}

impl UserProfile {
    pub fn from_identity(identity: &Identity, owner_email: &str) -> Self {
        let display_name = identity
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "User".to_string());
        let photo_url = identity.photo_url.clone().unwrap_or_else(|| {
            format!(
                "https://ui-avatars.com/api/?name={}",
                url::form_urlencoded::byte_serialize(display_name.as_bytes()).collect::<String>()
            )
        });

        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            is_owner: is_owner_email(&identity.email, owner_email),
            display_name,
            photo_url,
        }
    }
}

/// RFC 3339 `createdAt` as UTC millis; unparsable values sort as oldest.
pub fn created_millis(raw: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.timestamp_millis())
        .unwrap_or(i64::MIN)
}

pub fn is_owner_email(email: &str, owner_email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.eq_ignore_ascii_case(owner_email.trim())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub last_login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_status: Option<BlockStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_notifications: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_uses_camel_case_on_the_wire() {
        let order = Order {
            id: "ABC".to_string(),
            user_id: "u1".to_string(),
            user_email: "a@b.uz".to_string(),
            user_name: "Ali".to_string(),
            first_name: "Ali".to_string(),
            last_name: None,
            gender: Gender::Male,
            phone_number: "+998 90 123 45 67".to_string(),
            telegram_username: "@alivali".to_string(),
            design_types: vec!["Banner".to_string()],
            game: "Minecraft".to_string(),
            message: String::new(),
            total_price: 50000,
            promo_code: None,
            status: OrderStatus::Checking,
            created_at: "2026-01-01T10:00:00Z".to_string(),
            cancel_reason: None,
        };

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["totalPrice"], 50000);
        assert_eq!(json["status"], "Checking");
        assert!(json.get("promoCode").is_none());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("approved".parse::<OrderStatus>().unwrap(), OrderStatus::Approved);
        assert_eq!("Cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_block_status_expiry() {
        assert!(BlockStatus::permanent().is_active(i64::MAX));
        assert!(BlockStatus::until(1_000).is_active(999));
        assert!(!BlockStatus::until(1_000).is_active(1_000));
        assert!(!BlockStatus::lifted().is_active(0));
    }

    #[test]
    fn test_owner_detection() {
        let identity = Identity {
            uid: "u1".to_string(),
            email: " Owner@Example.com".to_string(),
            display_name: None,
            photo_url: None,
        };
        let profile = UserProfile::from_identity(&identity, "owner@example.com");
        assert!(profile.is_owner);
        assert_eq!(profile.display_name, "User");
        assert!(!is_owner_email("", ""));
    }
}

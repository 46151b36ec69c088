use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map};

use crate::core::ids;
use crate::core::orders::{self, order_path};
use crate::core::storefront::{user_path, Storefront, WORKING_HOURS_PATH};
use crate::domain::hours::WorkingHours;
use crate::domain::model::{
    BlockStatus, Notification, NotificationKind, Order, OrderStatus, PortfolioItem, UserMetadata,
};
use crate::domain::ports;
use crate::utils::error::{Result, StorefrontError};
use crate::utils::validation::{
    sanitize_input, sanitize_message, validate_url, MAX_MESSAGE_INPUT, MAX_SHORT_INPUT,
};

pub const PORTFOLIO_PATH: &str = "portfolio";

#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Debug, Clone)]
pub struct Broadcast {
    pub title: String,
    pub message: String,
    /// `None` 代表全體廣播
    pub target_uid: Option<String>,
    pub link: Option<String>,
    pub attachment: Option<Attachment>,
}

pub fn notification_path(kind: NotificationKind, target_uid: Option<&str>, id: &str) -> String {
    match (kind, target_uid) {
        (NotificationKind::Private, Some(uid)) => format!("notifications/private/{}/{}", uid, id),
        _ => format!("notifications/global/{}", id),
    }
}

/// Guesses a MIME type from the file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

// 每個操作都先檢查店主身分
pub struct AdminConsole<'a> {
    sf: &'a Storefront,
}

impl<'a> AdminConsole<'a> {
    pub fn new(sf: &'a Storefront) -> Self {
        Self { sf }
    }

    fn require_owner(&self, action: &str) -> Result<()> {
        self.sf.session().require_owner(action).map(|_| ())
    }

    async fn upload_with_timeout(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        let limit = self.sf.config().upload_timeout();
        match tokio::time::timeout(limit, self.sf.storage().upload(path, data, content_type)).await {
            Ok(result) => result,
            Err(_) => Err(StorefrontError::TimeoutError {
                operation: format!("Upload of {}", path),
                seconds: limit.as_secs(),
            }),
        }
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.require_owner("list all orders")?;
        let mut all = orders::load_all(self.sf).await;
        orders::sort_newest_first(&mut all);
        Ok(all)
    }

    pub async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> Result<()> {
        self.require_owner("change order status")?;
        let path = order_path(order_id);
        if self.sf.store().get(&path).await?.is_none() {
            return Err(StorefrontError::not_found("Order", order_id));
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(status));
        self.sf.store().update(&path, fields).await?;
        tracing::info!("📝 Order {} set to {}", order_id, status);
        Ok(())
    }

    pub async fn set_working_hours(&self, hours: &WorkingHours) -> Result<()> {
        self.require_owner("change working hours")?;
        hours.bounds()?;
        self.sf
            .store()
            .set(WORKING_HOURS_PATH, serde_json::to_value(hours)?)
            .await?;
        tracing::info!(
            "🕒 Working hours set to {}{}",
            hours,
            if hours.wraps_midnight() { " (overnight)" } else { "" }
        );
        Ok(())
    }

    /// Seeds `config/workingHours` from the configured default when the store has none.
    pub async fn ensure_default_hours(&self) -> Result<bool> {
        self.require_owner("initialise working hours")?;
        let Some(default) = self.sf.config().business.default_hours.clone() else {
            return Ok(false);
        };
        if self.sf.store().get(WORKING_HOURS_PATH).await?.is_some() {
            return Ok(false);
        }
        self.set_working_hours(&default).await?;
        Ok(true)
    }

    pub async fn broadcast(&self, broadcast: Broadcast, now: DateTime<Utc>) -> Result<Notification> {
        self.require_owner("send notifications")?;

        let title = sanitize_input(&broadcast.title, MAX_SHORT_INPUT);
        let message = sanitize_message(&broadcast.message, MAX_MESSAGE_INPUT);
        if title.is_empty() || message.is_empty() {
            return Err(StorefrontError::validation(
                "Notification title and message are required",
            ));
        }
        let link = broadcast.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        if let Some(link) = &link {
            validate_url("link", link)?;
        }
        let target_uid = broadcast
            .target_uid
            .map(|uid| uid.trim().to_string())
            .filter(|uid| !uid.is_empty());
        let kind = if target_uid.is_some() {
            NotificationKind::Private
        } else {
            NotificationKind::Global
        };

        let id = ids::record_id(now);
        let mut notification = Notification {
            id: id.clone(),
            title,
            message,
            image_url: None,
            attachment_url: None,
            link,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            kind,
            target_uid: target_uid.clone(),
        };

        if let Some(attachment) = &broadcast.attachment {
            let url = self
                .upload_with_timeout(
                    &format!("notifications/{}", id),
                    &attachment.data,
                    &attachment.content_type,
                )
                .await?;
            if attachment.is_image() {
                notification.image_url = Some(url);
            } else {
                notification.attachment_url = Some(url);
            }
        }

        let path = notification_path(kind, target_uid.as_deref(), &id);
        self.sf
            .store()
            .set(&path, serde_json::to_value(&notification)?)
            .await?;
        tracing::info!(
            "📢 Sent {:?} notification {}{}",
            kind,
            id,
            target_uid.map(|u| format!(" to {}", u)).unwrap_or_default()
        );
        Ok(notification)
    }

    pub async fn add_portfolio_item(
        &self,
        title: &str,
        data: &[u8],
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<PortfolioItem> {
        self.require_owner("edit the portfolio")?;
        let title = sanitize_input(title, MAX_SHORT_INPUT);
        if title.is_empty() {
            return Err(StorefrontError::validation("Portfolio title is required"));
        }
        if data.is_empty() {
            return Err(StorefrontError::validation("Portfolio image is empty"));
        }

        let id = ids::record_id(now);
        let path = format!("{}/{}", PORTFOLIO_PATH, id);
        let image_url = self.upload_with_timeout(&path, data, content_type).await?;

        let item = PortfolioItem {
            id: id.clone(),
            title,
            image_url,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let mut record = Map::new();
        record.insert("title".to_string(), json!(item.title));
        record.insert("imageUrl".to_string(), json!(item.image_url));
        record.insert("createdAt".to_string(), json!(item.created_at));
        self.sf.store().set(&path, record.into()).await?;

        tracing::info!("🖼️ Portfolio item {} added", id);
        Ok(item)
    }

    pub async fn remove_portfolio_item(&self, id: &str) -> Result<()> {
        self.require_owner("edit the portfolio")?;
        let path = format!("{}/{}", PORTFOLIO_PATH, id);
        if self.sf.store().get(&path).await?.is_none() {
            return Err(StorefrontError::not_found("Portfolio item", id));
        }

        // 圖檔刪除失敗不阻擋紀錄刪除
        if let Err(e) = self.sf.storage().delete(&path).await {
            tracing::warn!("⚠️ Could not delete image for {}: {}", id, e);
        }
        self.sf.store().remove(&path).await?;
        tracing::info!("🗑️ Portfolio item {} removed", id);
        Ok(())
    }

    /// Users by most recent login.
    pub async fn list_users(&self) -> Result<Vec<UserMetadata>> {
        self.require_owner("list users")?;
        let mut users: Vec<UserMetadata> = match ports::read_children::<UserMetadata>(self.sf.store(), "users").await {
            Ok(children) => children.into_iter().map(|(_, u)| u).collect(),
            Err(e) => {
                tracing::warn!("⚠️ Could not load users: {}", e);
                Vec::new()
            }
        };
        users.sort_by(|a, b| b.last_login.cmp(&a.last_login));
        Ok(users)
    }

    /// `until = None` blocks permanently.
    pub async fn block_user(&self, uid: &str, until: Option<DateTime<Utc>>) -> Result<BlockStatus> {
        self.require_owner("block users")?;
        if self.sf.session().user().map(|u| u.uid.as_str()) == Some(uid) {
            return Err(StorefrontError::validation("You cannot block your own account"));
        }
        let status = match until {
            Some(t) => BlockStatus::until(t.timestamp_millis()),
            None => BlockStatus::permanent(),
        };
        self.write_block_status(uid, status).await?;
        tracing::info!("⛔ Blocked {} (until {})", uid, status.blocked_until);
        Ok(status)
    }

    pub async fn unblock_user(&self, uid: &str) -> Result<()> {
        self.require_owner("unblock users")?;
        self.write_block_status(uid, BlockStatus::lifted()).await?;
        tracing::info!("✅ Unblocked {}", uid);
        Ok(())
    }

    async fn write_block_status(&self, uid: &str, status: BlockStatus) -> Result<()> {
        if self.sf.store().get(&user_path(uid)).await?.is_none() {
            return Err(StorefrontError::not_found("User", uid));
        }
        let path = format!("{}/blockStatus", user_path(uid));
        self.sf.store().set(&path, serde_json::to_value(status)?).await
    }
}

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{json, Map};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::toml_config::StorefrontConfig;
use crate::core::admin::AdminConsole;
use crate::core::feed::{FeedService, UserFeed};
use crate::core::orders::OrderService;
use crate::domain::hours::{self, ClockTime, WorkingHours};
use crate::domain::model::{created_millis, BlockStatus, Identity, PortfolioItem, UserProfile};
use crate::domain::ports::{self, MessageSink, ObjectStorage, RealtimeStore};
use crate::domain::pricing::{self, PriceQuote, ServiceId};
use crate::domain::session::Session;
use crate::domain::wizard::OrderWizard;
use crate::utils::error::{Result, StorefrontError};

pub const WORKING_HOURS_PATH: &str = "config/workingHours";

pub fn user_path(uid: &str) -> String {
    format!("users/{}", uid)
}

pub struct Storefront {
    config: Arc<StorefrontConfig>,
    offset: FixedOffset,
    store: Arc<dyn RealtimeStore>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<dyn MessageSink>,
    session: Session,
}

impl Storefront {
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn RealtimeStore>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<dyn MessageSink>,
    ) -> Result<Self> {
        let offset = config.utc_offset()?;
        let session = Session::new(config.business.owner_email.clone());
        Ok(Self {
            config: Arc::new(config),
            offset,
            store,
            storage,
            notifier,
            session,
        })
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn store(&self) -> &dyn RealtimeStore {
        self.store.as_ref()
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self)
    }

    pub fn admin(&self) -> AdminConsole<'_> {
        AdminConsole::new(self)
    }

    pub fn feed(&self) -> FeedService {
        FeedService::new(Arc::clone(&self.store))
    }

    /// 被封鎖的帳號不能讀取或標記通知
    pub fn my_feed(&self, now: DateTime<Utc>) -> Result<UserFeed> {
        let user = self.session.require_active(now.timestamp_millis())?;
        Ok(UserFeed::new(self.feed(), user.uid.clone()))
    }

    pub fn wizard(&self) -> OrderWizard {
        OrderWizard::new(
            self.config.catalog.prices.clone(),
            self.config.promo.clone(),
            self.config.catalog.games.clone(),
        )
    }

    pub fn local_clock(&self, now: DateTime<Utc>) -> ClockTime {
        hours::local_clock(now, self.offset)
    }

    /// Remote working hours; unreadable or malformed data reads as unset.
    pub async fn working_hours(&self) -> Option<WorkingHours> {
        match ports::read_typed::<WorkingHours>(self.store(), WORKING_HOURS_PATH).await {
            Ok(hours) => hours,
            Err(e) => {
                tracing::warn!("⚠️ Could not read working hours: {}", e);
                None
            }
        }
    }

    pub async fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hours = self.working_hours().await;
        let open = hours::is_open_with(hours.as_ref(), self.local_clock(now));
        tracing::debug!(
            "🕒 {} local, hours {:?}, open = {}",
            self.local_clock(now),
            hours.as_ref().map(|h| h.to_string()),
            open
        );
        open
    }

    /// Signs in, records the login under `users/{uid}` and loads the block status.
    pub async fn sign_in(&mut self, identity: &Identity, now: DateTime<Utc>) -> Result<UserProfile> {
        let profile = self.session.sign_in(identity)?.clone();

        let mut fields = Map::new();
        fields.insert("uid".to_string(), json!(profile.uid));
        fields.insert("email".to_string(), json!(profile.email));
        fields.insert("displayName".to_string(), json!(profile.display_name));
        fields.insert("photoUrl".to_string(), json!(profile.photo_url));
        fields.insert(
            "lastLogin".to_string(),
            json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        if let Err(e) = self.store.update(&user_path(&profile.uid), fields).await {
            tracing::warn!("⚠️ Could not record login for {}: {}", profile.uid, e);
        }

        let block_path = format!("{}/blockStatus", user_path(&profile.uid));
        let block = match ports::read_typed::<BlockStatus>(self.store(), &block_path).await {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!("⚠️ Could not read block status for {}: {}", profile.uid, e);
                None
            }
        };
        self.session.set_block_status(block)?;
        self.session.mark_subscribed()?;

        tracing::info!(
            "👤 Signed in as {} ({}){}",
            profile.display_name,
            profile.uid,
            if profile.is_owner { " [owner]" } else { "" }
        );
        Ok(profile)
    }

    pub fn sign_out(&mut self) -> bool {
        let was_signed_in = self.session.sign_out();
        if was_signed_in {
            tracing::info!("👋 Signed out");
        }
        was_signed_in
    }

    /// Public portfolio, newest first. Read failures yield an empty list.
    pub async fn portfolio(&self) -> Vec<PortfolioItem> {
        let children = match ports::read_children::<PortfolioItem>(self.store(), "portfolio").await {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!("⚠️ Could not load portfolio: {}", e);
                return Vec::new();
            }
        };

        let mut items: Vec<PortfolioItem> = children
            .into_iter()
            .map(|(key, mut item)| {
                if item.id.is_empty() {
                    item.id = key;
                }
                item
            })
            .collect();
        items.sort_by_key(|item| std::cmp::Reverse(created_millis(&item.created_at)));
        items
    }

    /// Prices a selection, rejecting services that are not in the catalog.
    pub fn quote(&self, services: &[String], promo: &str, no_promo: bool) -> Result<PriceQuote> {
        let catalog = &self.config.catalog.prices;
        let mut selected: BTreeSet<ServiceId> = BTreeSet::new();
        for service in services {
            let id = catalog
                .canonical_id(service.trim())
                .ok_or_else(|| StorefrontError::validation(format!("Unknown service: {}", service)))?;
            selected.insert(id.to_string());
        }
        Ok(pricing::quote(&selected, catalog, promo.trim(), no_promo, &self.config.promo))
    }

    /// Outbound messages never fail the operation that triggered them.
    pub(crate) async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send(text).await {
            tracing::warn!("⚠️ {} ({})", e.user_friendly_message(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalObjectStorage, LocalRealtimeStore, LogSink};
    use chrono::TimeZone;
    use serde_json::json;

    fn storefront(data: serde_json::Value) -> Storefront {
        let config = StorefrontConfig::from_toml_str(
            "[business]\nowner_email = \"owner@example.com\"\n",
        )
        .unwrap();
        Storefront::new(
            config,
            Arc::new(LocalRealtimeStore::with_data(data)),
            Arc::new(LocalObjectStorage::new(std::env::temp_dir(), None)),
            Arc::new(LogSink),
        )
        .unwrap()
    }

    fn identity(uid: &str, email: &str) -> Identity {
        Identity {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: Some("Ali".to_string()),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_is_open_uses_shop_offset() {
        let sf = storefront(json!({"config": {"workingHours": {"start": "10:00", "end": "19:00"}}}));
        // 05:30 UTC = 10:30 Tashkent
        assert!(sf.is_open(Utc.with_ymd_and_hms(2026, 5, 1, 5, 30, 0).unwrap()).await);
        // 14:30 UTC = 19:30 Tashkent
        assert!(!sf.is_open(Utc.with_ymd_and_hms(2026, 5, 1, 14, 30, 0).unwrap()).await);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_hours_is_closed() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap();
        assert!(!storefront(json!({})).is_open(now).await);
        let sf = storefront(json!({"config": {"workingHours": {"start": "ten", "end": "19:00"}}}));
        assert!(!sf.is_open(now).await);
    }

    #[tokio::test]
    async fn test_sign_in_records_login_and_block_status() {
        let mut sf = storefront(json!({
            "users": {"u1": {"uid": "u1", "blockStatus": {"isBlocked": true, "blockedUntil": -1}}}
        }));
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap();

        let profile = sf.sign_in(&identity("u1", "ali@example.com"), now).await.unwrap();
        assert!(!profile.is_owner);
        assert!(sf.session().is_blocked(now.timestamp_millis()));

        let login = sf.store().get("users/u1/lastLogin").await.unwrap().unwrap();
        assert!(login.as_str().unwrap().starts_with("2026-05-01T07:00:00"));

        // 已登入時不能再次登入
        assert!(sf.sign_in(&identity("u2", "x@example.com"), now).await.is_err());
        assert!(sf.sign_out());
        assert!(!sf.sign_out());
    }

    #[tokio::test]
    async fn test_portfolio_newest_first_and_ids_from_keys() {
        let sf = storefront(json!({"portfolio": {
            "a": {"title": "Old", "imageUrl": "u1", "createdAt": "2026-01-01T00:00:00.000Z"},
            "b": {"title": "New", "imageUrl": "u2", "createdAt": "2026-02-01T00:00:00.000Z"},
            "c": {"broken": true}
        }}));
        let items = sf.portfolio().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "New");
        assert_eq!(items[0].id, "b");
    }

    #[tokio::test]
    async fn test_portfolio_orders_by_instant_not_text() {
        // 字串比較會把 d 排第一；實際時間 d = 08:00Z 最舊
        let sf = storefront(json!({"portfolio": {
            "d": {"title": "Offset", "imageUrl": "u4", "createdAt": "2026-03-01T13:00:00+05:00"},
            "e": {"title": "Seconds", "imageUrl": "u5", "createdAt": "2026-03-01T09:00:00Z"},
            "f": {"title": "Millis", "imageUrl": "u6", "createdAt": "2026-03-01T08:30:00.500Z"}
        }}));
        let ids: Vec<String> = sf.portfolio().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["e", "f", "d"]);
    }

    #[test]
    fn test_quote_rejects_unknown_service() {
        let sf = storefront(json!({}));
        let quote = sf
            .quote(&["banner".to_string(), "Avatar".to_string()], "Artishok_uz", false)
            .unwrap();
        assert_eq!(quote.total, 56_250);
        assert!(sf.quote(&["Logo".to_string()], "", false).is_err());
    }
}

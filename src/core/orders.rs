use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map};

use crate::adapters::telegram;
use crate::core::ids;
use crate::core::storefront::Storefront;
use crate::domain::model::{created_millis, Order, OrderStatus};
use crate::domain::ports;
use crate::domain::pricing::compute_total;
use crate::domain::wizard::OrderDraft;
use crate::utils::error::{Result, StorefrontError};
use crate::utils::validation::{sanitize_message, MAX_MESSAGE_INPUT};

pub const ORDERS_PATH: &str = "orders";

const MAX_ID_ATTEMPTS: usize = 5;

pub fn order_path(id: &str) -> String {
    format!("{}/{}", ORDERS_PATH, id)
}

pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by_key(|o| std::cmp::Reverse(created_millis(&o.created_at)));
}

/// Reads every order; failures become an empty list.
pub(crate) async fn load_all(sf: &Storefront) -> Vec<Order> {
    match ports::read_children::<Order>(sf.store(), ORDERS_PATH).await {
        Ok(children) => children.into_iter().map(|(_, order)| order).collect(),
        Err(e) => {
            tracing::warn!("⚠️ Could not load orders: {}", e);
            Vec::new()
        }
    }
}

pub struct OrderService<'a> {
    sf: &'a Storefront,
}

impl<'a> OrderService<'a> {
    pub fn new(sf: &'a Storefront) -> Self {
        Self { sf }
    }

    async fn fresh_id(&self) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = ids::order_id();
            if self.sf.store().get(&order_path(&id)).await?.is_none() {
                return Ok(id);
            }
            tracing::debug!("🔁 Order id {} already taken", id);
        }
        Err(StorefrontError::store(
            ORDERS_PATH,
            "could not allocate a unique order id",
        ))
    }

    pub async fn submit(&self, draft: &OrderDraft, now: DateTime<Utc>) -> Result<Order> {
        let user = self.sf.session().require_active(now.timestamp_millis())?;

        let config = self.sf.config();
        let catalog = &config.catalog.prices;
        // 包含付款確認
        draft.validate(catalog, config.games())?;
        if !user.is_owner && !self.sf.is_open(now).await {
            return Err(StorefrontError::ServiceClosed);
        }

        let total = compute_total(
            &draft.services,
            catalog,
            &draft.promo_code,
            draft.no_promo,
            &config.promo,
        );
        let last_name = draft.last_name.trim();

        let order = Order {
            id: self.fresh_id().await?,
            user_id: user.uid.clone(),
            user_email: user.email.clone(),
            user_name: user.display_name.clone(),
            first_name: draft.first_name.trim().to_string(),
            last_name: (!last_name.is_empty()).then(|| last_name.to_string()),
            gender: draft.gender,
            phone_number: draft.phone.clone(),
            telegram_username: draft.telegram.clone(),
            design_types: draft.services.iter().cloned().collect(),
            game: draft.game.trim().to_string(),
            message: draft.message.clone(),
            total_price: total,
            promo_code: draft.effective_promo_code(),
            status: OrderStatus::Checking,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            cancel_reason: None,
        };

        self.sf
            .store()
            .set(&order_path(&order.id), serde_json::to_value(&order)?)
            .await?;
        tracing::info!(
            "🧾 Order {} submitted by {} ({} {})",
            order.id,
            order.user_id,
            order.total_price,
            config.business.currency
        );

        let text = telegram::new_order_message(
            &order,
            &config.business.name,
            &config.business.currency,
            self.sf.offset(),
        );
        self.sf.notify(&text).await;

        Ok(order)
    }

    /// The signed-in user's orders, newest first.
    pub async fn list_mine(&self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let uid = self.sf.session().require_active(now.timestamp_millis())?.uid.clone();
        let mut orders: Vec<Order> = load_all(self.sf)
            .await
            .into_iter()
            .filter(|o| o.user_id == uid)
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    pub async fn cancel(&self, order_id: &str, reason: &str, now: DateTime<Utc>) -> Result<Order> {
        let user = self.sf.session().require_active(now.timestamp_millis())?;
        let reason = sanitize_message(reason, MAX_MESSAGE_INPUT);
        if reason.is_empty() {
            return Err(StorefrontError::validation(
                "Please give a reason for the cancellation",
            ));
        }

        let path = order_path(order_id);
        let mut order = ports::read_typed::<Order>(self.sf.store(), &path)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Order", order_id))?;

        if order.user_id != user.uid {
            return Err(StorefrontError::permission("cancel another user's order"));
        }
        if order.status != OrderStatus::Checking {
            return Err(StorefrontError::validation(format!(
                "Only orders that are still being checked can be cancelled (current status: {})",
                order.status
            )));
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(OrderStatus::Cancelled));
        fields.insert("cancelReason".to_string(), json!(reason));
        self.sf.store().update(&path, fields).await?;

        order.status = OrderStatus::Cancelled;
        order.cancel_reason = Some(reason.clone());
        tracing::info!("🚫 Order {} cancelled by {}", order.id, user.uid);

        let config = self.sf.config();
        let text = telegram::cancellation_message(
            &order,
            &reason,
            &config.business.currency,
            now,
            self.sf.offset(),
        );
        self.sf.notify(&text).await;

        Ok(order)
    }
}

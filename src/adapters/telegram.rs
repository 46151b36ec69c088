use crate::config::toml_config::TelegramConfig;
use crate::domain::model::Order;
use crate::domain::ports::MessageSink;
use crate::domain::pricing::format_amount;
use crate::utils::error::{Result, StorefrontError};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const SEPARATOR: &str = "-----------------------------";

/// Bot API `sendMessage` to a single admin chat.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(
            &config.api_base,
            &config.bot_token,
            &config.chat_id,
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorefrontError::DeliveryError {
                message: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        tracing::debug!("📨 Telegram message delivered ({} chars)", text.chars().count());
        Ok(())
    }
}

/// Stand-in when no bot is configured: the message only goes to the log.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, text: &str) -> Result<()> {
        tracing::info!("📭 Telegram not configured, message logged only:\n{}", text);
        Ok(())
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// `dd.mm.yyyy HH:MM` on the shop's wall clock.
pub fn format_local(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%d.%m.%Y %H:%M").to_string()
}

fn format_created_at(created_at: &str, offset: FixedOffset) -> String {
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(t) => format_local(t.with_timezone(&Utc), offset),
        Err(_) => escape_html(created_at),
    }
}

pub fn new_order_message(order: &Order, business: &str, currency: &str, offset: FixedOffset) -> String {
    let promo = order
        .promo_code
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or("Yo'q");
    let message = if order.message.trim().is_empty() {
        "Tavsif yo'q"
    } else {
        order.message.as_str()
    };

    [
        format!("🚀 <b>Yangi Buyurtma! ({})</b>", escape_html(business)),
        SEPARATOR.to_string(),
        format!("🆔 <b>ID:</b> {}", escape_html(&order.id)),
        format!("👤 <b>Mijoz:</b> {}", escape_html(&order.full_name())),
        format!("📞 <b>Tel:</b> {}", escape_html(&order.phone_number)),
        format!("📱 <b>Telegram:</b> {}", escape_html(&order.telegram_username)),
        format!("🎮 <b>O'yin:</b> {}", escape_html(&order.game)),
        format!("🎨 <b>Turi:</b> {}", escape_html(&order.design_types.join(", "))),
        format!(
            "💰 <b>Narxi:</b> {} {}",
            format_amount(order.total_price),
            escape_html(currency)
        ),
        format!("🎟️ <b>Promokod:</b> {}", escape_html(promo)),
        format!("📅 <b>Sana:</b> {}", format_created_at(&order.created_at, offset)),
        String::new(),
        "📝 <b>Xabar:</b>".to_string(),
        format!("<i>{}</i>", escape_html(message)),
        SEPARATOR.to_string(),
        "✅ Holat: Tekshirilmoqda".to_string(),
    ]
    .join("\n")
}

pub fn cancellation_message(
    order: &Order,
    reason: &str,
    currency: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> String {
    [
        "❌ <b>Buyurtma Bekor Qilindi!</b>".to_string(),
        SEPARATOR.to_string(),
        format!("🆔 <b>Order ID:</b> {}", escape_html(&order.id)),
        format!("👤 <b>Mijoz:</b> {}", escape_html(&order.full_name())),
        format!("📞 <b>Tel:</b> {}", escape_html(&order.phone_number)),
        format!(
            "💰 <b>Qiymati:</b> {} {}",
            format_amount(order.total_price),
            escape_html(currency)
        ),
        String::new(),
        "⚠️ <b>Bekor qilish sababi:</b>".to_string(),
        format!("<i>{}</i>", escape_html(reason)),
        SEPARATOR.to_string(),
        format!("📅 Sana: {}", format_local(now, offset)),
    ]
    .join("\n")
}

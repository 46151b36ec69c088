use anyhow::Result;
use chrono::{TimeZone, Utc};
use elbek_storefront::domain::model::Identity;
use elbek_storefront::domain::ports::MessageSink;
use elbek_storefront::{
    HttpObjectStorage, RestRealtimeStore, Storefront, StorefrontConfig, StorefrontError,
    TelegramSink,
};
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config() -> StorefrontConfig {
    StorefrontConfig::from_toml_str(
        r#"
[business]
owner_email = "owner@example.com"

[telegram]
bot_token = "123:abc"
chat_id = "42"
"#,
    )
    .unwrap()
}

fn customer() -> Identity {
    Identity {
        uid: "u1".to_string(),
        email: "ali@example.com".to_string(),
        display_name: Some("Ali".to_string()),
        photo_url: None,
    }
}

fn storefront(server: &MockServer) -> Storefront {
    let config = config();
    let telegram = config.telegram.clone().unwrap();
    Storefront::new(
        config,
        Arc::new(
            RestRealtimeStore::new(&server.url("/db"), Some("db-secret".to_string()), Duration::from_secs(5))
                .unwrap(),
        ),
        Arc::new(
            HttpObjectStorage::new(&server.base_url(), "demo-bucket", None, Duration::from_secs(5))
                .unwrap(),
        ),
        Arc::new(
            TelegramSink::new(&server.base_url(), &telegram.bot_token, &telegram.chat_id, Duration::from_secs(5))
                .unwrap(),
        ),
    )
    .unwrap()
}

/// Mocks for sign-in and an always-open shop.
fn mock_session(server: &MockServer) {
    server.mock(|when, then| {
        when.method(PATCH)
            .path("/db/users/u1.json")
            .query_param("auth", "db-secret");
        then.status(200).json_body(json!({}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/db/users/u1/blockStatus.json");
        then.status(200).body("null");
    });
    server.mock(|when, then| {
        when.method(GET).path("/db/config/workingHours.json");
        then.status(200)
            .json_body(json!({"start": "00:00", "end": "23:59"}));
    });
}

fn order_path() -> Regex {
    Regex::new(r"^/db/orders/[0-9A-Z]{8}\.json$").unwrap()
}

async fn submit_order(sf: &Storefront) -> elbek_storefront::Result<String> {
    let mut wizard = sf.wizard();
    wizard.set_first_name("Ali");
    wizard.set_phone("+998901234567");
    wizard.set_telegram("@ali_valiyev");
    wizard.next()?;
    wizard.toggle_service("Banner")?;
    wizard.next()?;
    wizard.set_game("Minecraft");
    wizard.next()?;
    wizard.confirm_payment(true);
    let draft = wizard.finish()?;

    let now = Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap();
    Ok(sf.orders().submit(&draft, now).await?.id)
}

#[tokio::test]
async fn test_order_is_written_over_rest_and_announced_on_telegram() -> Result<()> {
    let server = MockServer::start();
    mock_session(&server);
    let id_check = server.mock(|when, then| {
        when.method(GET).path_matches(order_path());
        then.status(200).body("null");
    });
    let write = server.mock(|when, then| {
        when.method(PUT)
            .path_matches(order_path())
            .json_body_partial(r#"{"status": "Checking", "totalPrice": 50000, "userId": "u1"}"#);
        then.status(200).json_body(json!({}));
    });
    let telegram = server.mock(|when, then| {
        when.method(POST)
            .path("/bot123:abc/sendMessage")
            .json_body_partial(r#"{"chat_id": "42", "parse_mode": "HTML"}"#);
        then.status(200).json_body(json!({"ok": true}));
    });

    let mut sf = storefront(&server);
    sf.sign_in(&customer(), Utc::now()).await?;
    let id = submit_order(&sf).await?;

    assert_eq!(id.len(), 8);
    id_check.assert();
    write.assert();
    telegram.assert();
    Ok(())
}

#[tokio::test]
async fn test_telegram_outage_is_logged_not_fatal() -> Result<()> {
    let server = MockServer::start();
    mock_session(&server);
    server.mock(|when, then| {
        when.method(GET).path_matches(order_path());
        then.status(200).body("null");
    });
    let write = server.mock(|when, then| {
        when.method(PUT).path_matches(order_path());
        then.status(200).json_body(json!({}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/bot123:abc/sendMessage");
        then.status(401)
            .json_body(json!({"ok": false, "description": "Unauthorized"}));
    });

    let mut sf = storefront(&server);
    sf.sign_in(&customer(), Utc::now()).await?;
    assert!(submit_order(&sf).await.is_ok());
    write.assert();
    Ok(())
}

#[tokio::test]
async fn test_store_outage_fails_the_submission() -> Result<()> {
    let server = MockServer::start();
    mock_session(&server);
    server.mock(|when, then| {
        when.method(GET).path_matches(order_path());
        then.status(200).body("null");
    });
    server.mock(|when, then| {
        when.method(PUT).path_matches(order_path());
        then.status(503).body("unavailable");
    });

    let mut sf = storefront(&server);
    sf.sign_in(&customer(), Utc::now()).await?;
    let err = submit_order(&sf).await.unwrap_err();
    assert!(matches!(err, StorefrontError::StoreError { .. }));
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_store_reads_as_closed_and_empty() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(500);
    });

    let sf = storefront(&server);
    assert!(!sf.is_open(Utc::now()).await);
    assert!(sf.portfolio().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_telegram_sink_reports_delivery_errors() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/botbad/sendMessage");
        then.status(400).body("chat not found");
    });

    let sink = TelegramSink::new(&server.base_url(), "bad", "1", Duration::from_secs(5))?;
    let err = sink.send("hello").await.unwrap_err();
    assert!(matches!(err, StorefrontError::DeliveryError { .. }));
    assert!(err.to_string().contains("chat not found"));
    Ok(())
}

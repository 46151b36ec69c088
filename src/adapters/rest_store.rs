use crate::domain::ports::RealtimeStore;
use crate::utils::error::{Result, StorefrontError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Realtime-database style REST API: every node is reachable at
/// `{endpoint}/{path}.json`, with `?auth=` for the access token.
#[derive(Debug, Clone)]
pub struct RestRealtimeStore {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl RestRealtimeStore {
    pub fn new(endpoint: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|t| !t.trim().is_empty() && !t.contains("${")),
        })
    }

    fn node_url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}.json", self.endpoint, path.trim_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| StorefrontError::store(path, e.to_string()))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorefrontError::store(
            path,
            format!("HTTP {}: {}", status, body.trim()),
        ))
    }
}

#[async_trait]
impl RealtimeStore for RestRealtimeStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let url = self.node_url(path)?;
        tracing::debug!("📡 GET {}", path);
        let response = Self::check(path, self.client.get(url).send().await?).await?;
        let value: Value = response.json().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let url = self.node_url(path)?;
        tracing::debug!("📡 PUT {}", path);
        Self::check(path, self.client.put(url).json(&value).send().await?).await?;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let url = self.node_url(path)?;
        tracing::debug!("📡 PATCH {} ({} fields)", path, fields.len());
        Self::check(path, self.client.patch(url).json(&fields).send().await?).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let url = self.node_url(path)?;
        tracing::debug!("📡 DELETE {}", path);
        Self::check(path, self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;

    fn store(server: &MockServer, token: Option<&str>) -> RestRealtimeStore {
        RestRealtimeStore::new(
            &server.base_url(),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_null_is_none() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/config/workingHours.json");
            then.status(200).body("null");
        });

        let value = store(&server, None).get("config/workingHours").await.unwrap();
        mock.assert();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_auth_token_is_sent_as_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/orders.json")
                .query_param("auth", "secret");
            then.status(200).json_body(json!({"A": {"id": "A"}}));
        });

        let value = store(&server, Some("secret")).get("/orders/").await.unwrap();
        mock.assert();
        assert_eq!(value.unwrap()["A"]["id"], "A");
    }

    #[tokio::test]
    async fn test_put_patch_delete() {
        let server = MockServer::start();
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/orders/X1.json")
                .json_body(json!({"id": "X1"}));
            then.status(200).json_body(json!({"id": "X1"}));
        });
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path("/orders/X1.json")
                .json_body(json!({"status": "Approved"}));
            then.status(200).json_body(json!({"status": "Approved"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/orders/X1.json");
            then.status(200).body("null");
        });

        let s = store(&server, None);
        s.set("orders/X1", json!({"id": "X1"})).await.unwrap();
        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("Approved"));
        s.update("orders/X1", fields).await.unwrap();
        s.remove("orders/X1").await.unwrap();

        put.assert();
        patch.assert();
        delete.assert();
    }

    #[tokio::test]
    async fn test_error_status_is_store_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/orders.json");
            then.status(401).json_body(json!({"error": "Permission denied"}));
        });

        let err = store(&server, None).get("orders").await.unwrap_err();
        assert!(matches!(err, StorefrontError::StoreError { .. }));
        assert!(err.to_string().contains("401"));
    }
}

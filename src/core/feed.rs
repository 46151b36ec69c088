use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::storefront::user_path;
use crate::domain::model::Notification;
use crate::domain::notifications::{FeedView, NotificationFeed, ReadSet, SourceState};
use crate::domain::ports::{self, RealtimeStore};
use crate::utils::error::Result;

pub const GLOBAL_NOTIFICATIONS_PATH: &str = "notifications/global";

pub fn private_notifications_path(uid: &str) -> String {
    format!("notifications/private/{}", uid)
}

pub fn read_notifications_path(uid: &str) -> String {
    format!("{}/readNotifications", user_path(uid))
}

/// Loads the two notification sources and the user's read set.
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn RealtimeStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    async fn load_source(&self, path: &str) -> SourceState {
        match ports::read_children::<Notification>(self.store.as_ref(), path).await {
            Ok(children) => SourceState::Loaded(
                children
                    .into_iter()
                    .map(|(key, mut n)| {
                        if n.id.is_empty() {
                            n.id = key;
                        }
                        n
                    })
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!("⚠️ Notification source {} unreachable: {}", path, e);
                SourceState::Unreachable(e.to_string())
            }
        }
    }

    async fn load_read_set(&self, uid: &str) -> ReadSet {
        let path = read_notifications_path(uid);
        match ports::read_typed::<Vec<String>>(self.store.as_ref(), &path).await {
            Ok(ids) => ReadSet::from_ids(ids.unwrap_or_default()),
            Err(e) => {
                tracing::warn!("⚠️ Could not read {}: {}", path, e);
                ReadSet::default()
            }
        }
    }

    /// One source failing leaves the other visible; the view reports which degraded.
    pub async fn refresh(&self, uid: &str) -> NotificationFeed {
        let private_path = private_notifications_path(uid);
        let (global, private, read) = tokio::join!(
            self.load_source(GLOBAL_NOTIFICATIONS_PATH),
            self.load_source(&private_path),
            self.load_read_set(uid),
        );

        let mut feed = NotificationFeed::new();
        feed.set_global(global);
        feed.set_private(private);
        feed.set_read(read);
        feed
    }

    async fn persist_read_set(&self, uid: &str, read: &ReadSet) -> Result<()> {
        self.store
            .set(&read_notifications_path(uid), serde_json::to_value(read.to_vec())?)
            .await
    }

    /// Writes only when the id was not already read.
    pub async fn mark_read(&self, feed: &mut NotificationFeed, uid: &str, id: &str) -> Result<bool> {
        if !feed.mark_read(id) {
            return Ok(false);
        }
        self.persist_read_set(uid, feed.read_set()).await?;
        Ok(true)
    }

    pub async fn mark_all_read(&self, feed: &mut NotificationFeed, uid: &str) -> Result<usize> {
        let newly_read = feed.mark_all_read();
        if newly_read > 0 {
            self.persist_read_set(uid, feed.read_set()).await?;
        }
        Ok(newly_read)
    }

    /// Polls both sources and emits a view whenever it changes. The first view
    /// is always emitted. Dropping the returned handle stops the task.
    pub fn watch(&self, uid: &str, interval: Duration) -> FeedWatch {
        let (tx, rx) = mpsc::channel(8);
        let service = self.clone();
        let uid = uid.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<FeedView> = None;

            loop {
                ticker.tick().await;
                let view = service.refresh(&uid).await.view();
                if last.as_ref() == Some(&view) {
                    continue;
                }
                if tx.send(view.clone()).await.is_err() {
                    tracing::debug!("🔕 Feed watcher for {} closed", uid);
                    break;
                }
                last = Some(view);
            }
        });

        FeedWatch { rx, handle }
    }
}

/// The signed-in user's feed; built only for an active account.
#[derive(Clone)]
pub struct UserFeed {
    service: FeedService,
    uid: String,
}

impl UserFeed {
    pub fn new(service: FeedService, uid: impl Into<String>) -> Self {
        Self {
            service,
            uid: uid.into(),
        }
    }

    pub async fn refresh(&self) -> NotificationFeed {
        self.service.refresh(&self.uid).await
    }

    pub async fn mark_read(&self, feed: &mut NotificationFeed, id: &str) -> Result<bool> {
        self.service.mark_read(feed, &self.uid, id).await
    }

    pub async fn mark_all_read(&self, feed: &mut NotificationFeed) -> Result<usize> {
        self.service.mark_all_read(feed, &self.uid).await
    }

    pub fn watch(&self, interval: Duration) -> FeedWatch {
        self.service.watch(&self.uid, interval)
    }
}

pub struct FeedWatch {
    rx: mpsc::Receiver<FeedView>,
    handle: JoinHandle<()>,
}

impl FeedWatch {
    pub async fn next(&mut self) -> Option<FeedView> {
        self.rx.recv().await
    }
}

impl Drop for FeedWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalRealtimeStore;
    use serde_json::json;

    fn seeded() -> Arc<dyn RealtimeStore> {
        Arc::new(LocalRealtimeStore::with_data(json!({
            "notifications": {
                "global": {
                    "g1": {"id": "g1", "title": "Sale", "message": "m", "createdAt": "2026-01-01T10:00:00Z", "type": "global"}
                },
                "private": {
                    "u1": {
                        "p1": {"id": "p1", "title": "Done", "message": "m", "createdAt": "2026-01-02T10:00:00Z", "type": "private", "targetUid": "u1"}
                    }
                }
            },
            "users": {"u1": {"uid": "u1", "readNotifications": ["g1"]}}
        })))
    }

    #[tokio::test]
    async fn test_refresh_merges_and_applies_read_set() {
        let service = FeedService::new(seeded());
        let view = service.refresh("u1").await.view();
        assert_eq!(view.ids().collect::<Vec<_>>(), vec!["p1", "g1"]);
        assert_eq!(view.unread, 1);
        assert!(view.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_writes_only_on_change() {
        let store = seeded();
        let service = FeedService::new(Arc::clone(&store));
        let mut feed = service.refresh("u1").await;

        assert!(!service.mark_read(&mut feed, "u1", "g1").await.unwrap());
        assert!(service.mark_read(&mut feed, "u1", "p1").await.unwrap());
        assert_eq!(
            store.get("users/u1/readNotifications").await.unwrap(),
            Some(json!(["g1", "p1"]))
        );
        assert_eq!(feed.view().unread, 0);
        assert_eq!(service.mark_all_read(&mut feed, "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_watch_emits_initial_view_and_changes() {
        let store = seeded();
        let service = FeedService::new(Arc::clone(&store));
        let mut watch = service.watch("u1", Duration::from_millis(20));

        let first = watch.next().await.unwrap();
        assert_eq!(first.items.len(), 2);

        store
            .set(
                "notifications/global/g2",
                json!({"id": "g2", "title": "New", "message": "m", "createdAt": "2026-01-03T10:00:00Z", "type": "global"}),
            )
            .await
            .unwrap();

        let second = tokio::time::timeout(Duration::from_secs(2), watch.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.items[0].notification.id, "g2");
        assert_eq!(second.unread, 2);
    }
}

use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::model::{created_millis, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Global,
    Private,
}

/// What one source delivered on its last read.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    Loaded(Vec<Notification>),
    Unreachable(String),
}

impl SourceState {
    pub fn items(&self) -> &[Notification] {
        match self {
            SourceState::Loaded(items) => items,
            SourceState::Unreachable(_) => &[],
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, SourceState::Unreachable(_))
    }
}

impl Default for SourceState {
    fn default() -> Self {
        SourceState::Loaded(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSet {
    ids: BTreeSet<String>,
}

impl ReadSet {
    pub fn from_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Returns `false` when the id was already read.
    pub fn mark_read(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    pub fn is_read(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub notification: Notification,
    pub source: FeedSource,
    pub read: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedView {
    pub items: Vec<FeedItem>,
    pub unread: usize,
    pub degraded: Vec<FeedSource>,
}

impl FeedView {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.notification.id.as_str())
    }
}

// 全域與個人通知合併，新的在前，同時間保持輸入順序
pub fn merge(global: &[Notification], private: &[Notification]) -> Vec<(FeedSource, Notification)> {
    let mut merged: Vec<(FeedSource, Notification)> = global
        .iter()
        .cloned()
        .map(|n| (FeedSource::Global, n))
        .chain(private.iter().cloned().map(|n| (FeedSource::Private, n)))
        .collect();
    // sort_by_key 是穩定排序
    merged.sort_by_key(|(_, n)| std::cmp::Reverse(created_millis(&n.created_at)));
    merged
}

/// Distinct ids in the merged set that are not yet read.
pub fn unread_count(items: &[(FeedSource, Notification)], read: &ReadSet) -> usize {
    items
        .iter()
        .map(|(_, n)| n.id.as_str())
        .filter(|id| !read.is_read(id))
        .collect::<BTreeSet<_>>()
        .len()
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    global: SourceState,
    private: SourceState,
    read: ReadSet,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(&mut self, state: SourceState) {
        self.global = state;
    }

    pub fn set_private(&mut self, state: SourceState) {
        self.private = state;
    }

    pub fn set_read(&mut self, read: ReadSet) {
        self.read = read;
    }

    pub fn read_set(&self) -> &ReadSet {
        &self.read
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        self.read.mark_read(id)
    }

    /// Marks every currently visible id; returns how many were newly read.
    pub fn mark_all_read(&mut self) -> usize {
        let ids: Vec<String> = self
            .global
            .items()
            .iter()
            .chain(self.private.items())
            .map(|n| n.id.clone())
            .collect();
        ids.iter().filter(|id| self.read.mark_read(id)).count()
    }

    pub fn view(&self) -> FeedView {
        let merged = merge(self.global.items(), self.private.items());
        let unread = unread_count(&merged, &self.read);

        let mut degraded = Vec::new();
        if self.global.is_unreachable() {
            degraded.push(FeedSource::Global);
        }
        if self.private.is_unreachable() {
            degraded.push(FeedSource::Private);
        }

        let items = merged
            .into_iter()
            .map(|(source, notification)| FeedItem {
                read: self.read.is_read(&notification.id),
                notification,
                source,
            })
            .collect();

        FeedView {
            items,
            unread,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NotificationKind;

    fn note(id: &str, at: &str, kind: NotificationKind) -> Notification {
        Notification {
            id: id.to_string(),
            title: format!("title {}", id),
            message: "hello".to_string(),
            image_url: None,
            attachment_url: None,
            link: None,
            created_at: at.to_string(),
            kind,
            target_uid: None,
        }
    }

    fn global(id: &str, at: &str) -> Notification {
        note(id, at, NotificationKind::Global)
    }

    fn private(id: &str, at: &str) -> Notification {
        note(id, at, NotificationKind::Private)
    }

    #[test]
    fn test_merge_orders_newest_first() {
        let g = vec![global("g1", "2026-01-01T10:00:00Z"), global("g2", "2026-01-03T10:00:00Z")];
        let p = vec![private("p1", "2026-01-02T10:00:00Z")];
        let merged = merge(&g, &p);
        let ids: Vec<&str> = merged.iter().map(|(_, n)| n.id.as_str()).collect();
        assert_eq!(ids, vec!["g2", "p1", "g1"]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let at = "2026-01-01T10:00:00Z";
        let g = vec![global("g1", at), global("g2", at)];
        let p = vec![private("p1", at)];
        let merged = merge(&g, &p);
        let ids: Vec<&str> = merged.iter().map(|(_, n)| n.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2", "p1"]);
    }

    #[test]
    fn test_mark_all_read_clears_unread_and_is_idempotent() {
        let mut feed = NotificationFeed::new();
        feed.set_global(SourceState::Loaded(vec![global("g1", "2026-01-01T10:00:00Z")]));
        feed.set_private(SourceState::Loaded(vec![private("p1", "2026-01-02T10:00:00Z")]));
        assert_eq!(feed.view().unread, 2);

        assert_eq!(feed.mark_all_read(), 2);
        assert_eq!(feed.view().unread, 0);
        assert_eq!(feed.mark_all_read(), 0);
        assert!(!feed.mark_read("g1"));
        assert_eq!(feed.view().unread, 0);
    }

    #[test]
    fn test_mark_read_twice_changes_count_once() {
        let mut feed = NotificationFeed::new();
        feed.set_global(SourceState::Loaded(vec![
            global("g1", "2026-01-01T10:00:00Z"),
            global("g2", "2026-01-01T11:00:00Z"),
        ]));
        assert!(feed.mark_read("g1"));
        assert_eq!(feed.view().unread, 1);
        assert!(!feed.mark_read("g1"));
        assert_eq!(feed.view().unread, 1);
    }

    #[test]
    fn test_read_ids_outside_the_feed_do_not_count() {
        let mut feed = NotificationFeed::new();
        feed.set_read(ReadSet::from_ids(vec!["gone".to_string()]));
        feed.set_global(SourceState::Loaded(vec![global("g1", "2026-01-01T10:00:00Z")]));
        assert_eq!(feed.view().unread, 1);
    }

    #[test]
    fn test_unreachable_source_degrades() {
        let mut feed = NotificationFeed::new();
        feed.set_global(SourceState::Unreachable("timeout".to_string()));
        feed.set_private(SourceState::Loaded(vec![private("p1", "2026-01-02T10:00:00Z")]));
        let view = feed.view();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.degraded, vec![FeedSource::Global]);
        assert_eq!(view.items[0].source, FeedSource::Private);
    }
}

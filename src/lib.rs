pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{BackendKind, StorefrontConfig};

pub use adapters::{
    HttpObjectStorage, LocalObjectStorage, LocalRealtimeStore, LogSink, RestRealtimeStore,
    StaticIdentity, TelegramSink,
};
pub use crate::core::{AdminConsole, Broadcast, FeedService, OrderService, Storefront};
pub use utils::error::{Result, StorefrontError};

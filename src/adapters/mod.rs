pub mod identity;
pub mod local_store;
pub mod object_storage;
pub mod rest_store;
pub mod telegram;

pub use identity::StaticIdentity;
pub use local_store::LocalRealtimeStore;
pub use object_storage::{HttpObjectStorage, LocalObjectStorage};
pub use rest_store::RestRealtimeStore;
pub use telegram::{LogSink, TelegramSink};

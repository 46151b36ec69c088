pub mod admin;
pub mod feed;
pub mod ids;
pub mod orders;
pub mod storefront;

pub use admin::{AdminConsole, Attachment, Broadcast};
pub use feed::{FeedService, FeedWatch, UserFeed};
pub use orders::OrderService;
pub use storefront::Storefront;
pub use crate::utils::error::Result;

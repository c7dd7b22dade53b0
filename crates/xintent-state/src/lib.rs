//! # xintent State
//!
//! External collaborators a chain node depends on: the content-addressed
//! blob store, the price feed, and subscriptions to ledger events.

pub mod content;
pub mod oracle;
pub mod subscription;

pub use content::{ContentStore, InMemoryContentStore};
pub use oracle::{InMemoryPriceFeed, PriceFeed, PriceGuard, PriceReading};
pub use subscription::{ChainEvent, EventFilter, EventSubscription, SubscriptionManager};

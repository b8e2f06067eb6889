//! Notifications module
//!
//! Broadcasts lease lifecycle events to UI subscribers for reactive
//! re-render. The countdown value itself is polled via the read model;
//! only discrete transitions are pushed here.

pub mod event_bus;
pub mod events;

pub use event_bus::{create_event_bus, EventBus, EventSubscriber, SharedEventBus};
pub use events::*;

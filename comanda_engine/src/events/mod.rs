//! Notifications emitted by the order flow once a unit of work has committed.
//!
//! Subscribers register callbacks in [`EventHooks`]. Each callback gets its own channel and runs on the tokio
//! runtime, so a slow subscriber never holds up a payment.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};

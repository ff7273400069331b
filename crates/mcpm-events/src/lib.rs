//! Event delivery for mcpm.
//!
//! Classified events leave a server manager through an [`EventSink`]. This
//! crate provides:
//! - [`EventBus`]: a tokio broadcast channel fanning events out to any
//!   number of subscribers
//! - [`EventFilter`]: server/player/kind/scope predicates, also usable as a
//!   filtered subscription
//! - [`EventHooks`]: one-shot waiters notified exactly once by the first
//!   matching event
//!
//! # Example
//!
//! ```
//! use mcpm_events::{EventBus, EventFilter, EventSink};
//! use mcpm_models::{ClassifiedEvent, EventKindTag};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new();
//! let mut logs = bus.subscribe_filtered(EventFilter::new().with_kind(EventKindTag::Log));
//!
//! bus.publish(ClassifiedEvent::unstructured("survival".into(), "Loading libraries"));
//!
//! let event = logs.recv().await.unwrap();
//! assert_eq!(event.content(), "Loading libraries");
//! # }
//! ```

pub mod bus;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod sink;

pub use bus::{EventBus, FilteredReceiver};
pub use error::{EventError, Result};
pub use filter::EventFilter;
pub use hooks::EventHooks;
pub use sink::EventSink;

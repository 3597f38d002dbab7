//! Job progress broadcast engine.
//!
//! Provides:
//! - `JobStore` - latest `ProgressSnapshot` per job
//! - `SubscriberRegistry` - live observer sinks per job, with RAII `Subscription`s
//! - `ProgressPublisher` - store-then-fan-out update path
//! - `session::run` - per-observer streaming loop (replay, live updates, heartbeat)

pub mod publisher;
pub mod registry;
pub mod session;
pub mod store;

pub use publisher::{DeliveryConfig, ProgressPublisher, PublishOutcome};
pub use registry::{RegistryStats, SinkId, SubscriberRegistry, Subscription};
pub use session::{SessionContext, SessionMessage, SessionOutcome, SessionTransport, TransportClosed};
pub use store::{JobStore, Seq, Sequenced};

pub use fetchtube_core::{JobId, JobStatus, ProgressSnapshot};

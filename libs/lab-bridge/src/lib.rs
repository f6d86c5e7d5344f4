//! Side channels for the llama throughput benchmark harness.
//!
//! Sweep events go to the message bus, live gauges are served over HTTP,
//! and finished sweeps are archived to object storage and the memory API.
//! All of it is optional enrichment: when a downstream service is missing
//! the call returns `None` or does nothing, and the sweep carries on.

pub mod archive;
pub mod bus;
pub mod config;
pub mod envelope;
pub mod error;
pub mod exporter;
pub mod metrics;

pub use archive::{Archiver, ReasoningRecord, DEFAULT_BUCKET};
pub use bus::{BusClient, ConnectionManager, Connector, EventPublisher, NatsConnector};
pub use config::BridgeConfig;
pub use envelope::{make_envelope, Envelope};
pub use error::{BridgeError, DependencyError};
pub use exporter::MetricsServer;
pub use metrics::MetricsRegistry;

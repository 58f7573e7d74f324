//! Vigil pipeline runtime
//!
//! Wires feeds, the canonical store, and sinks into discrete cycles:
//! - [`IngestionCoordinator`]: fetch, normalize, merge, distribute
//! - [`Distributor`]: concurrent fanout of one record to all sinks
//! - [`SearchAggregator`]: federated search with merge-based dedup
//! - [`CorrelationScheduler`]: rule evaluation over store snapshots
//!
//! Per-item and per-sink failures are folded into reports as data; a cycle
//! always reaches a Completed* state unless the process dies.

pub mod aggregator;
pub mod cancel;
pub mod coordinator;
pub mod correlation;
pub mod distributor;
pub mod status;

pub use aggregator::*;
pub use cancel::*;
pub use coordinator::*;
pub use correlation::*;
pub use distributor::*;
pub use status::*;

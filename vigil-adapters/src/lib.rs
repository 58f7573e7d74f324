//! Vigil adapters - capability interfaces to external systems
//!
//! - [`SinkAdapter`]: an external intelligence sink (search/index backend)
//!   that receives distributed indicators and answers federated searches
//! - [`FeedSource`]: an upstream threat feed
//! - HTTP implementations of both, plus in-process implementations used by
//!   tests and demos

pub mod feed;
pub mod http_feed;
pub mod http_sink;
pub mod memory_sink;
pub mod sink;

pub use feed::*;
pub use http_feed::*;
pub use http_sink::*;
pub use memory_sink::*;
pub use sink::*;

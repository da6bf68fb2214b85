//! Remote Protocol Bridge engine
//!
//! - [`Node`]: owns the processors of one bridge, routes their traffic
//!   through its data handling strategy and feeds its observer queue
//! - [`Engine`]: owns every node, reconciles them against an
//!   [`EngineConfig`](rpb_core::EngineConfig) and forwards observed traffic
//!   to the active [`LoggingTarget`]
//! - [`handling`]: the closed set of data handling modes
//!
//! # Example
//!
//! ```no_run
//! use rpb_engine::Engine;
//! use rpb_core::EngineConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let engine = Engine::new();
//!     engine.set_state(&config)?;
//!     engine.start()?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod handling;
pub mod node;
pub mod observer;

pub use engine::{Engine, LoggingTarget};
pub use error::{EngineError, Result};
pub use handling::{DataHandlingStrategy, MessageRouter, ObjectDataHandling, RoleMembership};
pub use node::Node;
pub use observer::{NodeDataSink, ObservedMessage, ObserverQueue, DEFAULT_OBSERVER_CAPACITY};

//! # scope-link: acquisition-to-host pipeline controller
//!
//! Moves raw sample buffers from an acquisition source through trigger,
//! processing and packet formatting stages to a host-side viewer, while the
//! host reconfigures the pipeline over a separate command channel.
//!
//! ## Architecture
//!
//! - **Pipeline**: three stage threads joined by hand-off queues
//! - **Controller**: owns the stages and queues, runs command dispatch, and
//!   serializes reconfiguration as pause, mutate, flush
//! - **Host link**: in-process handle onto the command and response queues
//! - **Configuration**: TOML or JSON, every section optional
//!
//! ## Example
//!
//! ```ignore
//! use scope_link::{
//!     config::ScopeConfig,
//!     pipeline::{ChannelQueue, Controller},
//! };
//! use std::sync::Arc;
//!
//! fn main() -> scope_link::Result<()> {
//!     let config = ScopeConfig::load_or_default("scope-link.toml");
//!     let data = Arc::new(ChannelQueue::unbounded("data"));
//!     let controller = Controller::new(config, data.clone())?;
//!     controller.unpause();
//!
//!     let link = controller.host_link();
//!     link.request_ramp_demo(1);
//!     // ... push buffers into `data`, read packets from `link`
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::ScopeConfig;
pub use error::{Result, ScopeLinkError};
pub use pipeline::{Controller, HostLink, Packet};

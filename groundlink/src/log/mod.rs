//! Injected logging capability.
//!
//! Components never reach for a process-wide logger. Each one receives an
//! `Arc<dyn Logger>` at construction and logs through it, so a test can hand
//! in a [`RecordingLogger`] and assert on what was written while production
//! wiring hands in a [`TracingLogger`].
//!
//! # Usage
//!
//! ```
//! use groundlink::log::{Logger, NoOpLogger};
//! use groundlink::{log_info, log_warn};
//! use std::sync::Arc;
//!
//! struct Gate {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Gate {
//!     fn open(&self) {
//!         log_info!(self.logger, "Opening gate");
//!         log_warn!(self.logger, "Gate {} sticky", 4);
//!     }
//! }
//!
//! let gate = Gate { logger: Arc::new(NoOpLogger) };
//! gate.open();
//! ```

mod noop;
mod recording;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use recording::{LogEntry, RecordingLogger};
pub use tracing_adapter::TracingLogger;

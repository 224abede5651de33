//! # siphon
//!
//! Local-first event buffering with batched delivery to a remote collector.
//!
//! Siphon decouples event producers (CLI tools, short-lived processes)
//! from network availability: events are appended to a durable on-disk
//! journal and shipped opportunistically, in batches, when the queue grows
//! large or old enough.
//!
//! ## Architecture
//!
//! - Events are always recorded locally first; tracking never returns a
//!   hard error to producers, and degraded storage turns the tracker into
//!   a silent no-op.
//! - Flushing drains the journal, submits one batch, resubmits only the
//!   records the collector rejected (bounded attempts), and deletes the
//!   journal file only after full acceptance.
//! - A `disable` marker file opts the user out; a zero-byte sentinel's
//!   mtime remembers the last successful flush.
//!
//! ## Example
//!
//! ```rust,no_run
//! use siphon::{Body, Config, Siphon};
//!
//! let config = Config::load("myapp").expect("failed to load config");
//! let mut siphon = Siphon::new(config);
//!
//! siphon.set_global("version", env!("CARGO_PKG_VERSION"));
//! siphon.track("deploy", Body::new().set("env", "prod")).ok();
//!
//! // At shutdown: flush if the queue is big or old enough.
//! if let Err(e) = siphon.maybe_flush() {
//!     tracing::warn!(error = %e, "flush failed, events kept for next run");
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, LoggingConfig, QueueConfig, TransportConfig};
pub use error::{Error, Result};
pub use event::{Body, Event};
pub use store::TrackingStatus;
pub use tracker::{DeliveryStats, Siphon};
pub use transport::{BatchReceipt, HttpTransport, Record, RecordStatus, Transport};

// Public modules
pub mod config;
pub mod error;
pub mod event;
pub mod journal;
pub mod logging;
pub mod store;
pub mod tracker;
pub mod transport;

mod flush;

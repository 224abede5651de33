//! The tracking instance
//!
//! A [`Siphon`] owns one store root, its journal write handle, the global
//! field overlay, and an optional transport to the collector. Producers
//! call [`Siphon::track`]; the host decides when to call
//! [`Siphon::maybe_flush`] (on a timer, or at shutdown).
//!
//! Construction never fails hard: when local storage is unusable the
//! instance degrades to an inert tracker whose `track` calls succeed and
//! record nothing, so event recording can never break the host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Body, Event};
use crate::flush;
use crate::journal::Journal;
use crate::store::{self, Store, TrackingStatus};
use crate::transport::{HttpTransport, Record, Transport};

/// Counters accumulated across successful flushes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryStats {
    /// Fully delivered flushes
    pub flushes: usize,
    /// Flushes that failed (hard transport error or exhausted retries)
    pub flush_failures: usize,
    /// Events accepted by the collector
    pub events_delivered: usize,
    /// Rejected records that were resubmitted
    pub records_retried: usize,
    /// Batch calls made
    pub send_attempts: usize,
}

/// A local-first event tracker with batched remote delivery.
pub struct Siphon {
    config: Config,
    store: Store,
    journal: Journal,
    globals: Body,
    transport: Option<Box<dyn Transport>>,
    stats: DeliveryStats,
}

impl Siphon {
    /// Create an instance from configuration, building an HTTP transport
    /// when the transport config is ready.
    pub fn new(config: Config) -> Siphon {
        let transport: Option<Box<dyn Transport>> = if config.transport.is_ready() {
            match HttpTransport::new(config.transport.clone()) {
                Ok(t) => Some(Box::new(t)),
                Err(e) => {
                    tracing::error!(error = %e, "couldn't build collector transport");
                    None
                }
            }
        } else {
            None
        };

        Self::with_optional_transport(config, transport)
    }

    /// Create an instance with an injected transport.
    pub fn with_transport(config: Config, transport: Box<dyn Transport>) -> Siphon {
        Self::with_optional_transport(config, Some(transport))
    }

    fn with_optional_transport(config: Config, transport: Option<Box<dyn Transport>>) -> Siphon {
        let (store, journal) = match Self::resolve_root(&config) {
            Ok(root) => {
                let store = Store::open(root);
                let journal = if store.is_enabled() {
                    match Journal::open(store.events_path()) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!(error = %e, "couldn't open event journal");
                            Journal::closed(store.events_path())
                        }
                    }
                } else {
                    tracing::debug!(status = ?store.status(), "journal not opened");
                    Journal::closed(store.events_path())
                };
                (store, journal)
            }
            Err(e) => {
                tracing::error!(error = %e, "couldn't resolve store root");
                let store = Store::unavailable();
                let journal = Journal::closed(store.events_path());
                (store, journal)
            }
        };

        Siphon {
            config,
            store,
            journal,
            globals: Body::new(),
            transport,
            stats: DeliveryStats::default(),
        }
    }

    /// Explicit `queue.root` override, else the platform preferences
    /// directory named by `queue.dir` (defaulting to the stream name).
    fn resolve_root(config: &Config) -> Result<PathBuf> {
        if let Some(root) = &config.queue.root {
            return Ok(root.clone());
        }

        let dir = config.store_dir_name().ok_or_else(|| {
            Error::Config("queue.dir or transport.stream must name the store directory".to_string())
        })?;

        store::platform_root(dir)
    }

    /// Current tracking status
    pub fn status(&self) -> TrackingStatus {
        self.store.status()
    }

    /// The store root directory (empty when the root could not be resolved)
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// The persisted pseudo-identifier, if available
    pub fn user_id(&self) -> Option<&str> {
        self.store.user_id()
    }

    /// Set a global field included in every subsequently tracked event.
    /// Event-local fields with the same key always win.
    pub fn set_global(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.globals.insert(key, value);
    }

    /// Record event `name` with `body`.
    ///
    /// Global fields are merged in, the configured prefix is applied, and
    /// the event is stamped with the current time. When tracking is
    /// disabled or degraded this succeeds and records nothing.
    pub fn track(&mut self, name: &str, body: Body) -> Result<()> {
        if !self.journal.is_open() {
            return Ok(());
        }

        let mut body = body;
        body.merge_missing(&self.globals);

        let event = Event::now(format!("{}{}", self.config.queue.prefix, name), body);
        self.journal.append(&event)
    }

    /// Events currently queued on disk, oldest first
    pub fn events(&self) -> Result<Vec<Event>> {
        self.journal.read_all()
    }

    /// Number of events currently queued on disk
    pub fn pending_count(&self) -> Result<usize> {
        self.journal.count()
    }

    /// Time since the last successful flush, zero when unknown
    pub fn last_flush_age(&self) -> Duration {
        self.store.last_flush_age()
    }

    /// Accumulated delivery counters
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// Opt out of tracking: create the disable marker and stop recording.
    pub fn disable(&mut self) -> Result<()> {
        self.store.disable()?;
        self.journal.close()
    }

    /// Opt back in: remove the disable marker and resume recording.
    pub fn enable(&mut self) -> Result<()> {
        self.store.enable()?;
        if !self.journal.is_open() {
            self.journal = Journal::open(self.store.events_path())?;
        }
        Ok(())
    }

    /// Flush if the queue is large enough or old enough, otherwise close
    /// the write handle and leave the queued events for a future run.
    pub fn maybe_flush(&mut self) -> Result<()> {
        let age = self.store.last_flush_age();
        let size = self.journal.count()?;
        let above_size = self.config.queue.flush_above_size;
        let above_age = Duration::from_secs(self.config.queue.flush_above_age_secs);

        match flush::decide(size, age, above_size, above_age) {
            Some(reason) => {
                tracing::debug!(?age, size, above_size, ?above_age, ?reason, "flush");
                self.flush()
            }
            None => {
                tracing::debug!(?age, size, above_size, ?above_age, "below thresholds, close only");
                self.journal.close()
            }
        }
    }

    /// Drain the journal and deliver everything to the collector.
    ///
    /// Without a configured transport this is a silent no-op. On full
    /// success the last-flush sentinel advances and the journal file is
    /// deleted; on any failure the journal stays on disk so a later flush
    /// can resubmit.
    pub fn flush(&mut self) -> Result<()> {
        if self.store.status() == TrackingStatus::Unavailable {
            tracing::debug!("store unavailable, skipping flush");
            return Ok(());
        }
        if self.transport.is_none() {
            return Ok(());
        }

        let stream = self
            .config
            .transport
            .stream
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("missing transport.stream".to_string()))?
            .to_string();

        // No record may be mid-write while the journal is drained.
        self.journal.close()?;

        let events = self.journal.read_all()?;
        if events.is_empty() {
            return Ok(());
        }

        let mut records = Vec::with_capacity(events.len());
        for event in &events {
            records.push(Record::new(serde_json::to_vec(event)?));
        }

        let transport = match &self.transport {
            Some(t) => t.as_ref(),
            None => return Ok(()),
        };

        match flush::deliver(transport, &stream, records) {
            Ok(report) => {
                self.store
                    .touch()
                    .map_err(|e| Error::Store(format!("touching last-flush sentinel: {}", e)))?;
                self.journal.clear()?;

                self.stats.flushes += 1;
                self.stats.events_delivered += report.delivered;
                self.stats.records_retried += report.retried;
                self.stats.send_attempts += report.attempts;

                tracing::debug!(
                    events = report.delivered,
                    attempts = report.attempts,
                    "flush delivered"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.flush_failures += 1;
                Err(e)
            }
        }
    }

    /// Release the journal write handle. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.journal.close()
    }
}

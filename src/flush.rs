//! Flush decision and the bounded delivery protocol
//!
//! A flush drains the journal and submits every record in one batch call.
//! The collector answers per record; rejected records are resubmitted, in
//! their original order, until the batch is fully accepted or the attempt
//! limit is reached. A hard transport failure stops the protocol at once,
//! leaving the journal on disk for a later run.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{Record, Transport};

/// Total send attempts per flush: one initial call plus two retries.
pub(crate) const MAX_SEND_ATTEMPTS: usize = 3;

/// Why `maybe_flush` decided to flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushReason {
    /// Queued events reached the count threshold
    Size,
    /// Time since the last flush reached the age threshold
    Age,
}

/// Threshold check: size wins over age; `None` means leave the queue on
/// disk and close the write handle only.
pub(crate) fn decide(
    size: usize,
    age: Duration,
    above_size: usize,
    above_age: Duration,
) -> Option<FlushReason> {
    if size >= above_size {
        Some(FlushReason::Size)
    } else if age >= above_age {
        Some(FlushReason::Age)
    } else {
        None
    }
}

/// Accounting for one successful delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DeliveryReport {
    /// Batch calls made
    pub attempts: usize,
    /// Records accepted by the collector
    pub delivered: usize,
    /// Rejected records that were resubmitted
    pub retried: usize,
}

/// Submit `records` until the collector accepts them all.
///
/// Each retry resubmits only the still-rejected subset of the previous
/// attempt. Exhausting the attempt limit with records still rejected is
/// a [`Error::PartialDelivery`]; the caller keeps the journal intact.
pub(crate) fn deliver(
    transport: &dyn Transport,
    stream: &str,
    records: Vec<Record>,
) -> Result<DeliveryReport> {
    let total = records.len();
    let mut pending = records;
    let mut report = DeliveryReport::default();

    for attempt in 1..=MAX_SEND_ATTEMPTS {
        report.attempts = attempt;

        let receipt = transport.send_batch(stream, &pending)?;
        if receipt.len() != pending.len() {
            return Err(Error::Transport(format!(
                "receipt covers {} records but batch had {}",
                receipt.len(),
                pending.len()
            )));
        }

        let rejected = receipt.rejected_indices();
        if rejected.is_empty() {
            report.delivered = total;
            return Ok(report);
        }

        tracing::warn!(
            attempt,
            rejected = rejected.len(),
            batch = pending.len(),
            "collector rejected records"
        );

        report.retried += rejected.len();
        pending = keep_indices(pending, &rejected);
    }

    Err(Error::PartialDelivery {
        rejected: pending.len(),
        attempts: MAX_SEND_ATTEMPTS,
    })
}

/// Keep the records at `indices` (ascending), preserving order.
fn keep_indices(records: Vec<Record>, indices: &[usize]) -> Vec<Record> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| {
            if indices.binary_search(&i).is_ok() {
                Some(record)
            } else {
                None
            }
        })
        .collect()
}

//! Remote delivery transport
//!
//! The flush protocol hands the transport a batch of opaque wire records
//! tagged with a destination stream. The transport answers per record:
//! accepted, or rejected with an error code. A call can also fail as a
//! whole, which the protocol treats as a hard transport error rather than
//! a partial rejection.

mod http;

pub use http::HttpTransport;

use serde::Deserialize;

use crate::error::Result;

/// One opaque wire record, serialized once at append time and resubmitted
/// byte-identical on retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(data: Vec<u8>) -> Self {
        Record { data }
    }
}

/// Per-record outcome of a batch call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordStatus {
    /// Error code assigned by the collector, absent when accepted
    #[serde(default)]
    pub error_code: Option<String>,

    /// Human-readable rejection detail
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RecordStatus {
    /// An accepted record
    pub fn accepted() -> Self {
        RecordStatus::default()
    }

    /// A rejected record with the given error code
    pub fn rejected(code: impl Into<String>) -> Self {
        RecordStatus {
            error_code: Some(code.into()),
            error_message: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.error_code.is_none()
    }
}

/// Outcome of one batch call, one status per submitted record in
/// submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchReceipt {
    pub statuses: Vec<RecordStatus>,
}

impl BatchReceipt {
    /// A receipt accepting `n` records
    pub fn all_accepted(n: usize) -> Self {
        BatchReceipt {
            statuses: vec![RecordStatus::accepted(); n],
        }
    }

    /// Number of statuses in the receipt
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Positions of rejected records, ascending
    pub fn rejected_indices(&self) -> Vec<usize> {
        self.statuses
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_accepted())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of rejected records
    pub fn rejected_count(&self) -> usize {
        self.statuses.iter().filter(|s| !s.is_accepted()).count()
    }
}

/// A blocking batch sender.
///
/// `Err` means the call itself failed and nothing can be said about
/// individual records; a receipt with rejections is a partial failure
/// the flush protocol retries.
pub trait Transport {
    fn send_batch(&self, stream: &str, records: &[Record]) -> Result<BatchReceipt>;
}

//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading of transfer requests from any async byte source.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - the `From<TransferCsvRecord>` conversion in csv_format
//!
//! ```text
//! CSV bytes → AsyncReader → Vec<TransferRequest> (one batch)
//!                  ↓
//!           csv_format module
//! ```

use crate::io::csv_format::TransferCsvRecord;
use crate::types::{TransferError, TransferRequest};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Streams rows; only one batch is held in memory at a time.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` transfer requests
    ///
    /// Rows that fail to parse are logged and skipped. Returns an empty
    /// vector at end of input.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<TransferRequest> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<TransferCsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => batch.push(TransferRequest::from(record)),
                Some(Err(e)) => {
                    let line = e.position().map(|pos| pos.line());
                    let error = TransferError::ParseError {
                        line,
                        message: e.to_string(),
                    };
                    warn!(code = error.code(), "skipping transfer row: {}", error);
                }
                None => break,
            }
        }

        batch
    }
}

//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over typed rows of a CSV file, used for both
//! the seed accounts file and the transfers file.
//!
//! # Design
//!
//! `SyncReader<T>` wraps a `csv::Reader` and deserializes one row per
//! `next()` call, so memory use stays constant whatever the file size.
//!
//! ```no_run
//! use wallet_transfer_engine::io::csv_format::TransferCsvRecord;
//! use wallet_transfer_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::<TransferCsvRecord>::open(Path::new("transfers.csv")).unwrap();
//! for row in reader {
//!     match row {
//!         Ok(record) => println!("transfer: {:?}", record),
//!         Err(e) => eprintln!("skipped: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `open()`
//! - Individual row errors are yielded as `TransferError::ParseError` carrying
//!   the line number

use crate::io::csv_format::{convert_seed_record, SeedRecord};
use crate::types::{Account, TransferError};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;
use tracing::warn;

/// Open a file, mapping a missing file to `FileNotFound`
pub(crate) fn open_input(path: &Path) -> Result<File, TransferError> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TransferError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => TransferError::from(e),
    })
}

/// Synchronous CSV reader
///
/// Yields one `Result<T, TransferError>` per data row.
#[derive(Debug)]
pub struct SyncReader<T> {
    reader: csv::Reader<File>,
    _row: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> SyncReader<T> {
    /// Open a CSV file with a header row
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (for the optional idempotency key)
    /// - Use an 8KB buffer for efficient I/O
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = open_input(path)?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            _row: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for SyncReader<T> {
    type Item = Result<T, TransferError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader
            .deserialize::<T>()
            .next()
            .map(|row| row.map_err(TransferError::from))
    }
}

/// Read every valid seed account from `path`
///
/// Malformed rows are logged and skipped; a missing file is fatal.
pub fn read_seed_accounts(path: &Path) -> Result<Vec<Account>, TransferError> {
    let mut accounts = Vec::new();

    for row in SyncReader::<SeedRecord>::open(path)? {
        match row.map_err(|e| e.to_string()).and_then(convert_seed_record) {
            Ok(account) => accounts.push(account),
            Err(message) => warn!(path = %path.display(), "skipping seed row: {}", message),
        }
    }

    Ok(accounts)
}

// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Raw Arrow batches handed to the caller without row materialization.
//!
//! ## Ownership
//!
//! ```text
//!   decoder --(ArrowBatchHandle)--> pipeline store --(take)--> caller
//!                                        |
//!                               reset / drop: released
//! ```
//!
//! Every handle is registered in a [`BatchLedger`] shared by the result set.
//! `retain()` registers a second handle on the same record, `release()` (or
//! dropping the handle) unregisters it. The ledger lets callers and tests
//! check that no handle outlives the result set by accident.

use crate::error::{Error, Result};
use crate::types::row_type::RowType;
use arrow_array::RecordBatch;
use arrow_schema::Schema;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::error;

/// Counts the live [`ArrowBatchHandle`]s of one result set.
#[derive(Debug, Default)]
pub struct BatchLedger {
    live: AtomicUsize,
    retained_total: AtomicUsize,
}

impl BatchLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Handles ever created, including retains.
    pub fn retained_total(&self) -> usize {
        self.retained_total.load(Ordering::Relaxed)
    }

    fn retain(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
        self.retained_total.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Owned reference to one Arrow record batch.
#[derive(Debug)]
pub struct ArrowBatchHandle {
    batch: RecordBatch,
    ledger: Arc<BatchLedger>,
}

impl ArrowBatchHandle {
    pub(crate) fn new(batch: RecordBatch, ledger: &Arc<BatchLedger>) -> Self {
        ledger.retain();
        Self {
            batch,
            ledger: Arc::clone(ledger),
        }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// A second handle on the same record. Both must be released.
    pub fn retain(&self) -> Self {
        Self::new(self.batch.clone(), &self.ledger)
    }

    /// Give up this handle.
    pub fn release(self) {
        drop(self)
    }

    /// Release the handle and keep only the record batch, which is then
    /// managed by Arrow's own reference counting.
    pub fn into_batch(self) -> RecordBatch {
        self.batch.clone()
    }
}

impl Drop for ArrowBatchHandle {
    fn drop(&mut self) {
        self.ledger.release();
    }
}

/// Total rows across a chunk's batches.
pub fn count_rows(handles: &[ArrowBatchHandle]) -> usize {
    handles.iter().map(ArrowBatchHandle::num_rows).sum()
}

/// Check that a batch carries the metadata needed to decode it later.
///
/// Column count, names, and nullability must match the row type. The
/// `logicalType`, `precision`, `scale`, and `byteLength` field metadata keys
/// are compared when present; keys are matched without regard to case.
pub fn validate_batch_metadata(schema: &Schema, row_type: &RowType) -> Result<()> {
    let fields = schema.fields();
    if fields.len() != row_type.len() {
        return Err(mismatch(format!(
            "batch has {} columns, row type declares {}",
            fields.len(),
            row_type.len()
        )));
    }

    for (field, column) in fields.iter().zip(row_type.iter()) {
        if field.name() != &column.name {
            return Err(mismatch(format!(
                "column name '{}' does not match declared '{}'",
                field.name(),
                column.name
            )));
        }
        if field.is_nullable() != column.nullable {
            return Err(mismatch(format!(
                "column '{}' nullability {} does not match declared {}",
                column.name,
                field.is_nullable(),
                column.nullable
            )));
        }

        for (key, value) in field.metadata() {
            let matches = match key.to_ascii_uppercase().as_str() {
                "LOGICALTYPE" => value.eq_ignore_ascii_case(&column.type_name),
                "PRECISION" => value.parse::<i64>().ok() == Some(column.precision),
                "SCALE" => value.parse::<i64>().ok() == Some(column.scale),
                "BYTELENGTH" => value.parse::<i64>().ok() == Some(column.byte_length),
                _ => true,
            };
            if !matches {
                return Err(mismatch(format!(
                    "column '{}' metadata {}={} does not match the declared row type",
                    column.name, key, value
                )));
            }
        }
    }
    Ok(())
}

fn mismatch(detail: String) -> Error {
    error!("Lack or mismatch of necessary metadata to decode raw arrow batch: {}", detail);
    Error::metadata_mismatch(detail)
}

//! Canonical value encoding, row fingerprints and order-independent digests

use crate::config::Tolerance;
use crate::dataset::{Dataset, Value};
use crate::schema::{ComparableColumn, Side};
use blake3::Hasher;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

/// Fixed-width hash of one row's comparable values
pub type RowFingerprint = [u8; 32];

const TAG_NULL: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_FLOAT_BUCKET: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_BOOLEAN: u8 = 5;
const TAG_TEMPORAL: u8 = 6;
const TAG_BINARY: u8 = 7;
const TAG_OTHER: u8 = 8;
const TAG_COERCED: u8 = 9;

/// Width of the digest accumulator in bits
const DIGEST_BITS: usize = 256;
/// 2^52
const MAX_EXACT_BUCKET: f64 = 4_503_599_627_370_496.0;

/// How floats are written into the canonical encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatEncoding {
    /// Bit-exact after normalising -0.0 and NaN
    Exact,
    /// Rounded to a multiple of the bucket width
    Bucketed(f64),
}

/// Append the canonical encoding of one value
pub fn encode_value(value: &Value, floats: FloatEncoding, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Integer(i) => {
            out.push(TAG_INTEGER);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => encode_float(*f, floats, out),
        Value::String(s) => encode_bytes(TAG_STRING, s.as_bytes(), out),
        Value::Boolean(b) => {
            out.push(TAG_BOOLEAN);
            out.push(u8::from(*b));
        }
        Value::Temporal(ts) => {
            let utc = ts.and_utc();
            out.push(TAG_TEMPORAL);
            out.extend_from_slice(&utc.timestamp().to_le_bytes());
            out.extend_from_slice(&utc.timestamp_subsec_nanos().to_le_bytes());
        }
        Value::Binary(bytes) => encode_bytes(TAG_BINARY, bytes, out),
        Value::Other(s) => encode_bytes(TAG_OTHER, s.as_bytes(), out),
    }
}

/// Append the encoding of a cell as seen through its comparable column.
/// Type-changed columns go through string coercion on both sides.
pub fn encode_cell(column: &ComparableColumn, value: &Value, floats: FloatEncoding, out: &mut Vec<u8>) {
    if column.is_coerced() {
        match value.coerce_to_string() {
            Some(text) => encode_bytes(TAG_COERCED, text.as_bytes(), out),
            None => out.push(TAG_NULL),
        }
    } else {
        encode_value(value, floats, out);
    }
}

fn encode_bytes(tag: u8, bytes: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn encode_float(value: f64, floats: FloatEncoding, out: &mut Vec<u8>) {
    let value = normalize_float(value);
    if let FloatEncoding::Bucketed(width) = floats {
        let bucket = (value / width).round();
        // Past 2^52 adjacent floats are wider than one bucket, so hash exactly
        if bucket.is_finite() && bucket.abs() < MAX_EXACT_BUCKET {
            out.push(TAG_FLOAT_BUCKET);
            out.extend_from_slice(&normalize_float(bucket).to_bits().to_le_bytes());
            return;
        }
    }
    out.push(TAG_FLOAT);
    out.extend_from_slice(&value.to_bits().to_le_bytes());
}

fn normalize_float(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Order-independent digest of a whole dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDigest {
    /// Floats hashed bit-exactly
    pub exact: String,
    /// Floats hashed by tolerance bucket
    pub tolerant: String,
    pub rows: usize,
}

impl DatasetDigest {
    pub fn matches_exactly(&self, other: &DatasetDigest) -> bool {
        self.rows == other.rows && self.exact == other.exact
    }

    pub fn matches_within_tolerance(&self, other: &DatasetDigest) -> bool {
        self.rows == other.rows && self.tolerant == other.tolerant
    }
}

/// Commutative accumulator: the sum of row fingerprints modulo 2^256.
/// Duplicate rows count as many times as they occur.
#[derive(Debug, Clone)]
struct DigestAccumulator {
    sum: BigUint,
}

impl DigestAccumulator {
    fn new() -> Self {
        Self { sum: BigUint::zero() }
    }

    fn add(&mut self, fingerprint: &RowFingerprint) {
        self.sum += BigUint::from_bytes_be(fingerprint);
    }

    fn finish(self) -> String {
        let modulus = BigUint::one() << DIGEST_BITS;
        format!("{:064x}", self.sum % modulus)
    }
}

/// Hash computer for row fingerprints and dataset digests
pub struct HashComputer {
    tolerance: Tolerance,
}

impl HashComputer {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    fn bucketed(&self) -> FloatEncoding {
        match self.tolerance.bucket_width() {
            Some(width) => FloatEncoding::Bucketed(width),
            None => FloatEncoding::Exact,
        }
    }

    /// Fingerprint one row over the comparable columns, in their stable order
    pub fn row_fingerprint(
        &self,
        dataset: &Dataset,
        row: usize,
        columns: &[ComparableColumn],
        side: Side,
        floats: FloatEncoding,
    ) -> RowFingerprint {
        let mut buffer = Vec::with_capacity(columns.len() * 16);
        self.fingerprint_into(dataset, row, columns, side, floats, &mut buffer)
    }

    fn fingerprint_into(
        &self,
        dataset: &Dataset,
        row: usize,
        columns: &[ComparableColumn],
        side: Side,
        floats: FloatEncoding,
        buffer: &mut Vec<u8>,
    ) -> RowFingerprint {
        buffer.clear();
        for column in columns {
            encode_cell(column, dataset.value(row, column.index(side)), floats, buffer);
        }
        let mut hasher = Hasher::new();
        hasher.update(buffer);
        *hasher.finalize().as_bytes()
    }

    /// Compute both digests of a dataset in a single pass
    pub fn digest(&self, dataset: &Dataset, columns: &[ComparableColumn], side: Side) -> DatasetDigest {
        let bucketed = self.bucketed();
        let mut exact = DigestAccumulator::new();
        let mut tolerant = DigestAccumulator::new();
        let mut buffer = Vec::with_capacity(columns.len() * 16);

        for row in 0..dataset.row_count() {
            let fp = self.fingerprint_into(dataset, row, columns, side, FloatEncoding::Exact, &mut buffer);
            exact.add(&fp);
            if bucketed == FloatEncoding::Exact {
                tolerant.add(&fp);
            } else {
                let fp = self.fingerprint_into(dataset, row, columns, side, bucketed, &mut buffer);
                tolerant.add(&fp);
            }
        }

        DatasetDigest {
            exact: exact.finish(),
            tolerant: tolerant.finish(),
            rows: dataset.row_count(),
        }
    }

    /// Exact canonical bytes of a row restricted to the given columns; used
    /// as a join and distinct-count key
    pub fn key_bytes(dataset: &Dataset, row: usize, columns: &[&ComparableColumn], side: Side) -> Vec<u8> {
        let mut out = Vec::with_capacity(columns.len() * 16);
        for column in columns {
            encode_cell(column, dataset.value(row, column.index(side)), FloatEncoding::Exact, &mut out);
        }
        out
    }
}

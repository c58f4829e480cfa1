//! Encoding of (field, value) pairs into terms of the flattened `props` field.
//!
//! A term is `<field>\u{1}<encoded value>`. Numbers are encoded so that the
//! byte order of the terms matches numeric order, which makes lexicographic
//! range queries on the term dictionary correct for every value type.
//!
//! A number is `#<f64 key><exact key>`: the order-preserving bits of its
//! nearest `f64`, then its integral part as a sign-flipped `i128`. Integers
//! above 2^53 share an `f64` but never an exact key, and an integer still
//! compares equal to a decimal of the same value.

use crate::models::{format_utc, FieldValue};

pub const FIELD_SEPARATOR: char = '\u{1}';
const FIELD_END: char = '\u{2}';
const NUMBER_TAG: char = '#';

pub fn encode_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Str(s) | FieldValue::Timestamp(s) => s.clone(),
        FieldValue::Int(i) => sortable_number(*i as f64, i128::from(*i)),
        // saturating cast; beyond i128 no integer shares the f64 key
        FieldValue::Decimal(d) => sortable_number(*d, d.trunc() as i128),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::DateTime(dt) => format_utc(dt),
    }
}

pub fn encode_term(field: &str, value: &FieldValue) -> String {
    format!("{field}{FIELD_SEPARATOR}{}", encode_value(value))
}

/// Smallest term of `field`.
pub fn field_lower_limit(field: &str) -> String {
    format!("{field}{FIELD_SEPARATOR}")
}

/// Exclusive upper limit of every term of `field`.
pub fn field_upper_limit(field: &str) -> String {
    format!("{field}{FIELD_END}")
}

fn sortable_number(approx: f64, exact: i128) -> String {
    // -0.0 and 0.0 must encode identically
    let approx = if approx == 0.0 { 0.0 } else { approx };
    let bits = approx.to_bits();
    let key = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    let exact = (exact as u128) ^ (1 << 127);
    format!("{NUMBER_TAG}{key:016x}{exact:032x}")
}

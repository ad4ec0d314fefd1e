// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Conversion between service messages and their fixed layout records.
//!
//! Message to record copies are bounded: strings are cut to fit the fixed
//! buffer and repeated fields keep their first `N` elements, with a warning
//! naming the field. Record to message copies take the populated prefix of
//! every list and never truncate. Union tags without an arm, and endpoint
//! messages without a transport, fail with [`MarshalError::Unmappable`].

mod common;
mod entities;
mod network_connection;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::abi::{BoundedList, FixedString, StringList, UPSF_MAX_STRING_SIZE, UpsfKeyValue};
use upsf_client::Entity;

pub use common::{endpoint_from_abi, endpoint_to_abi};
pub(crate) use entities::{session_context_spec_from_abi, session_context_spec_to_abi};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("{field}: no mapping for the populated variant")]
    Unmappable { field: &'static str },
}

/// A fixed layout record and the service message it mirrors.
pub trait AbiRecord: Copy + Default + Send + 'static {
    type Message: Entity + Send;

    fn from_message(message: &Self::Message) -> Result<Self, MarshalError>;

    fn to_message(&self) -> Result<Self::Message, MarshalError>;

    fn name(&self) -> &FixedString;
}

/// Copies up to `N` converted elements of `source` into `dest`, in source
/// order, warning when the source holds more than fits.
pub fn fill_bounded<I, T, F, const N: usize>(
    field: &'static str,
    source: I,
    dest: &mut BoundedList<T, N>,
    mut convert: F,
) -> Result<(), MarshalError>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
    T: Copy,
    F: FnMut(I::Item) -> Result<T, MarshalError>,
{
    let source = source.into_iter();
    let count = source.len();

    for item in source.take(N) {
        if dest.push(convert(item)?).is_err() {
            break;
        }
    }

    if count > N {
        warn!(field, capacity = N, count, "repeated field truncated");
    }
    Ok(())
}

pub(crate) fn fixed(field: &'static str, value: &str) -> FixedString {
    let mut s = FixedString::default();
    if s.set(value) {
        debug!(
            field,
            capacity = UPSF_MAX_STRING_SIZE - 1,
            len = value.len(),
            "string truncated"
        );
    }
    s
}

pub(crate) fn fill_strings<const N: usize>(
    field: &'static str,
    source: &[String],
    dest: &mut StringList<N>,
) -> Result<(), MarshalError> {
    fill_bounded(field, source, dest, |s| Ok(fixed(field, s)))
}

pub(crate) fn strings<const N: usize>(list: &StringList<N>) -> Vec<String> {
    list.as_slice().iter().map(FixedString::to_string_lossy).collect()
}

pub(crate) fn fill_map<V, F, const N: usize>(
    field: &'static str,
    source: &BTreeMap<String, V>,
    dest: &mut BoundedList<UpsfKeyValue, N>,
    value: F,
) -> Result<(), MarshalError>
where
    F: Fn(&V) -> String,
{
    fill_bounded(field, source, dest, |(k, v)| {
        Ok(UpsfKeyValue {
            key: fixed(field, k),
            value: fixed(field, &value(v)),
        })
    })
}

pub(crate) fn map<V, F, const N: usize>(
    list: &BoundedList<UpsfKeyValue, N>,
    value: F,
) -> BTreeMap<String, V>
where
    F: Fn(&str) -> V,
{
    list.as_slice()
        .iter()
        .map(|kv| (kv.key.to_string_lossy(), value(&kv.value.to_string_lossy())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_fill_bounded_truncates_with_warning() {
        let source: Vec<String> = (0..20).map(|i| format!("sg-{i}")).collect();
        let mut dest = StringList::<16>::default();

        fill_strings("supported_service_group", &source, &mut dest).unwrap();

        assert_eq!(dest.count, 16);
        assert_eq!(strings(&dest), source[..16].to_vec());
        assert!(logs_contain("repeated field truncated"));
        assert!(logs_contain("supported_service_group"));
        assert!(logs_contain("capacity=16"));
        assert!(logs_contain("count=20"));
    }

    #[test]
    #[traced_test]
    fn test_fill_bounded_fits_silently() {
        let source = vec!["a".to_string(), "b".to_string()];
        let mut dest = StringList::<16>::default();

        fill_strings("prefix", &source, &mut dest).unwrap();

        assert_eq!(dest.count, 2);
        assert!(!logs_contain("repeated field truncated"));
    }

    #[test]
    fn test_fill_bounded_propagates_conversion_error() {
        let mut dest = BoundedList::<i32, 4>::default();
        let err = fill_bounded("tsf_endpoint", [1, 2, 3], &mut dest, |i| {
            if i == 2 {
                Err(MarshalError::Unmappable {
                    field: "tsf_endpoint",
                })
            } else {
                Ok(i)
            }
        })
        .unwrap_err();
        assert_eq!(
            err,
            MarshalError::Unmappable {
                field: "tsf_endpoint"
            }
        );
    }

    #[test]
    fn test_map_round_trip() {
        let mut source = BTreeMap::new();
        source.insert("nc-1".to_string(), true);
        source.insert("nc-2".to_string(), false);

        let mut dest = BoundedList::<UpsfKeyValue, 16>::default();
        fill_map("nc_active", &source, &mut dest, |v| (if *v { "1" } else { "0" }).to_string())
            .unwrap();

        assert_eq!(dest.as_slice()[0].value.to_string_lossy(), "1");
        assert_eq!(map(&dest, |v| v == "1"), source);
    }
}

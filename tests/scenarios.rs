// ==============================================
// CACHE DICTIONARY END-TO-END SCENARIOS
// ==============================================
//
// Cold/warm reads, collision eviction, expiry, the two-phase string path,
// and the error surface, driven through the public facade with a manual
// clock and a call-counting source.

mod common;

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use dictcache::clock::ManualClock;
use dictcache::dict::CacheDictionary;
use dictcache::error::CacheError;
use dictcache::source::MemorySource;
use dictcache::store::{AttributeKind, StringColumn, Value};

use common::{colliding_key, keys_in_distinct_slots, CountingSource, FailAfter};

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_000)))
}

fn u32_dict(
    source: Arc<CountingSource>,
    clock: Arc<ManualClock>,
    min_sec: u64,
    max_sec: u64,
) -> CacheDictionary {
    CacheDictionary::builder("scenario")
        .attribute("v", AttributeKind::U32, Value::UInt(0))
        .lifetime(min_sec, max_sec)
        .capacity(4)
        .clock(clock)
        .ttl_seed(7)
        .build(Box::new(source))
        .unwrap()
}

fn string_dict(source: Arc<CountingSource>, clock: Arc<ManualClock>) -> CacheDictionary {
    CacheDictionary::builder("scenario")
        .attribute("s", AttributeKind::Str, Value::Str(String::new()))
        .lifetime(600, 600)
        .capacity(4)
        .clock(clock)
        .ttl_seed(7)
        .build(Box::new(source))
        .unwrap()
}

// ==============================================
// Fixed-width path
// ==============================================

mod fixed_width {
    use super::*;

    #[test]
    fn cold_read_coalesces_misses_into_one_fetch() {
        let [k1, k2, k3]: [u64; 3] = keys_in_distinct_slots(4, 3).try_into().unwrap();
        let source = CountingSource::new(
            MemorySource::new()
                .row(k1, vec![Value::UInt(11)])
                .row(k2, vec![Value::UInt(22)]),
        );
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);

        let mut out = [0u32; 3];
        dict.get_u32_batch("v", &[k1, k2, k3], &mut out).unwrap();

        assert_eq!(out, [11, 22, 0]);
        assert_eq!(source.calls(), 1);
        let mut expected = vec![k1, k2, k3];
        expected.sort_unstable();
        assert_eq!(source.last_request(), expected);
    }

    #[test]
    fn warm_read_skips_the_source() {
        let [k1, k2]: [u64; 2] = keys_in_distinct_slots(4, 2).try_into().unwrap();
        let source = CountingSource::new(
            MemorySource::new()
                .row(k1, vec![Value::UInt(11)])
                .row(k2, vec![Value::UInt(22)]),
        );
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);

        let mut out = [0u32; 2];
        dict.get_u32_batch("v", &[k1, k2], &mut out).unwrap();
        assert_eq!(source.calls(), 1);

        assert_eq!(dict.get_u32("v", k1).unwrap(), 11);
        assert_eq!(dict.get_u32("v", k2).unwrap(), 22);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn duplicate_keys_fill_every_position() {
        let k = keys_in_distinct_slots(4, 1)[0];
        let source = CountingSource::new(MemorySource::new().row(k, vec![Value::UInt(5)]));
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);

        let mut out = [0u32; 4];
        dict.get_u32_batch("v", &[k, 0, k, k], &mut out).unwrap();
        assert_eq!(out, [5, 0, 5, 5]);
        // The miss set is deduplicated before hitting the source.
        assert_eq!(source.calls(), 1);
        assert_eq!(source.last_request(), vec![k]);
    }

    #[test]
    fn collision_evicts_the_previous_occupant() {
        let [k1, k2]: [u64; 2] = keys_in_distinct_slots(4, 2).try_into().unwrap();
        let k5 = colliding_key(k1, 4);
        let source = CountingSource::new(
            MemorySource::new()
                .row(k1, vec![Value::UInt(11)])
                .row(k2, vec![Value::UInt(22)])
                .row(k5, vec![Value::UInt(55)]),
        );
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);

        let mut out = [0u32; 2];
        dict.get_u32_batch("v", &[k1, k2], &mut out).unwrap();
        assert_eq!(out, [11, 22]);
        assert_eq!(source.calls(), 1);

        // k5 lands in k1's slot and overwrites it.
        assert_eq!(dict.get_u32("v", k5).unwrap(), 55);
        assert_eq!(source.calls(), 2);

        // k1 is gone; the neighbour in another slot is untouched.
        assert_eq!(dict.get_u32("v", k1).unwrap(), 11);
        assert_eq!(source.calls(), 3);
        assert_eq!(dict.get_u32("v", k2).unwrap(), 22);
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn expiry_reclassifies_entries_as_misses() {
        let [k1, k2]: [u64; 2] = keys_in_distinct_slots(4, 2).try_into().unwrap();
        let clock = manual_clock();
        let source = CountingSource::new(
            MemorySource::new()
                .row(k1, vec![Value::UInt(11)])
                .row(k2, vec![Value::UInt(22)]),
        );
        let dict = u32_dict(Arc::clone(&source), Arc::clone(&clock), 1, 1);

        let mut out = [0u32; 2];
        dict.get_u32_batch("v", &[k1, k2], &mut out).unwrap();
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::from_secs(2));

        dict.get_u32_batch("v", &[k1, k2], &mut out).unwrap();
        assert_eq!(out, [11, 22]);
        assert_eq!(source.calls(), 2);
        let mut expected = vec![k1, k2];
        expected.sort_unstable();
        assert_eq!(source.last_request(), expected);
    }

    #[test]
    fn ttl_stays_inside_the_lifetime_window() {
        let k = keys_in_distinct_slots(4, 1)[0];
        let clock = manual_clock();
        let source = CountingSource::new(MemorySource::new().row(k, vec![Value::UInt(1)]));
        let dict = u32_dict(Arc::clone(&source), Arc::clone(&clock), 5, 10);

        assert_eq!(dict.get_u32("v", k).unwrap(), 1);
        assert_eq!(source.calls(), 1);

        // Strictly inside min_sec: still fresh regardless of the draw.
        clock.advance(Duration::from_secs(4));
        assert_eq!(dict.get_u32("v", k).unwrap(), 1);
        assert_eq!(source.calls(), 1);

        // Past max_sec: stale regardless of the draw.
        clock.advance(Duration::from_secs(7));
        assert_eq!(dict.get_u32("v", k).unwrap(), 1);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn missing_key_yields_null_without_error() {
        let source = CountingSource::new(MemorySource::new());
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);

        let k = keys_in_distinct_slots(4, 1)[0];
        assert_eq!(dict.get_u32("v", k).unwrap(), 0);
        // A miss is never cached negatively.
        assert_eq!(dict.get_u32("v", k).unwrap(), 0);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn null_value_is_configurable() {
        let source = CountingSource::new(MemorySource::new());
        let dict = CacheDictionary::builder("nulls")
            .attribute("v", AttributeKind::I64, Value::Int(-1))
            .lifetime(600, 600)
            .capacity(4)
            .build(Box::new(Arc::clone(&source)))
            .unwrap();

        assert_eq!(dict.get_i64("v", 0).unwrap(), -1);
        assert_eq!(dict.get_i64("v", 12345).unwrap(), -1);
    }
}

// ==============================================
// String path
// ==============================================

mod strings {
    use super::*;

    #[test]
    fn cold_then_warm_two_phase() {
        let k10 = keys_in_distinct_slots(4, 1)[0];
        let source =
            CountingSource::new(MemorySource::new().row(k10, vec![Value::Str("hi".into())]));
        let dict = string_dict(Arc::clone(&source), manual_clock());

        let mut out = StringColumn::new();
        dict.get_string_batch("s", &[k10, 0, k10], &mut out).unwrap();
        let got: Vec<&[u8]> = out.iter().collect();
        assert_eq!(got, vec![&b"hi"[..], &b""[..], &b"hi"[..]]);
        assert_eq!(out.bytes(), b"hihi");
        assert_eq!(out.offsets(), &[2, 2, 4]);
        assert_eq!(source.calls(), 1);
        assert_eq!(source.last_request(), vec![k10]);

        // Warm repeat: optimistic pass only, no source traffic.
        let mut warm = StringColumn::new();
        dict.get_string_batch("s", &[k10, 0, k10], &mut warm).unwrap();
        assert_eq!(warm, out);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn mixed_hit_miss_preserves_order_and_coalesces() {
        let [k10, k20]: [u64; 2] = keys_in_distinct_slots(4, 2).try_into().unwrap();
        let source = CountingSource::new(
            MemorySource::new()
                .row(k10, vec![Value::Str("hi".into())])
                .row(k20, vec![Value::Str("yo".into())]),
        );
        let dict = string_dict(Arc::clone(&source), manual_clock());

        // Prime k10 only.
        let mut out = StringColumn::new();
        dict.get_string_batch("s", &[k10], &mut out).unwrap();
        assert_eq!(source.calls(), 1);

        // k20 misses mid-vector; output order must follow the input.
        let mut out = StringColumn::new();
        dict.get_string_batch("s", &[k10, k20, k10], &mut out).unwrap();
        let got: Vec<&[u8]> = out.iter().collect();
        assert_eq!(got, vec![&b"hi"[..], &b"yo"[..], &b"hi"[..]]);
        assert_eq!(source.calls(), 2);
        assert_eq!(source.last_request(), vec![k20]);
    }

    #[test]
    fn string_null_value_used_for_zero_and_missing() {
        let k = keys_in_distinct_slots(4, 1)[0];
        let source = CountingSource::new(MemorySource::new());
        let dict = CacheDictionary::builder("labels")
            .attribute("s", AttributeKind::Str, Value::Str("n/a".into()))
            .lifetime(600, 600)
            .capacity(4)
            .build(Box::new(Arc::clone(&source)))
            .unwrap();

        let mut out = StringColumn::new();
        dict.get_string_batch("s", &[0, k], &mut out).unwrap();
        let got: Vec<&[u8]> = out.iter().collect();
        assert_eq!(got, vec![&b"n/a"[..], &b"n/a"[..]]);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn observed_empty_string_is_not_null() {
        let k = keys_in_distinct_slots(4, 1)[0];
        let source =
            CountingSource::new(MemorySource::new().row(k, vec![Value::Str(String::new())]));
        let dict = CacheDictionary::builder("labels")
            .attribute("s", AttributeKind::Str, Value::Str("n/a".into()))
            .lifetime(600, 600)
            .capacity(4)
            .build(Box::new(Arc::clone(&source)))
            .unwrap();

        // The source answered with an empty value: that is an observation,
        // not an unknown key.
        assert_eq!(dict.get_string("s", k).unwrap(), "");
        assert_eq!(dict.get_string("s", k).unwrap(), "");
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn appends_after_existing_column_content() {
        let k = keys_in_distinct_slots(4, 1)[0];
        let source =
            CountingSource::new(MemorySource::new().row(k, vec![Value::Str("tail".into())]));
        let dict = string_dict(Arc::clone(&source), manual_clock());

        let mut out = StringColumn::new();
        out.push(b"head");
        // Cold call takes the pessimistic path; pre-existing content must
        // survive the optimistic pass being discarded.
        dict.get_string_batch("s", &[k], &mut out).unwrap();
        let got: Vec<&[u8]> = out.iter().collect();
        assert_eq!(got, vec![&b"head"[..], &b"tail"[..]]);
    }

    #[test]
    fn string_expiry_takes_pessimistic_path_again() {
        let k = keys_in_distinct_slots(4, 1)[0];
        let clock = manual_clock();
        let source =
            CountingSource::new(MemorySource::new().row(k, vec![Value::Str("v1".into())]));
        let dict = CacheDictionary::builder("labels")
            .attribute("s", AttributeKind::Str, Value::Str(String::new()))
            .lifetime(1, 1)
            .capacity(4)
            .clock(Arc::<ManualClock>::clone(&clock))
            .build(Box::new(Arc::clone(&source)))
            .unwrap();

        assert_eq!(dict.get_string("s", k).unwrap(), "v1");
        clock.advance(Duration::from_secs(2));
        assert_eq!(dict.get_string("s", k).unwrap(), "v1");
        assert_eq!(source.calls(), 2);
    }
}

// ==============================================
// Error surface
// ==============================================

mod errors {
    use super::*;

    #[test]
    fn type_mismatch_happens_before_source_io() {
        let source = CountingSource::new(MemorySource::new());
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);

        assert!(matches!(
            dict.get_u64("v", 1).unwrap_err(),
            CacheError::TypeMismatch(_)
        ));
        let mut col = StringColumn::new();
        assert!(matches!(
            dict.get_string_batch("v", &[1], &mut col).unwrap_err(),
            CacheError::TypeMismatch(_)
        ));
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn unknown_attribute_is_bad_arguments() {
        let source = CountingSource::new(MemorySource::new());
        let dict = u32_dict(Arc::clone(&source), manual_clock(), 600, 600);
        assert!(matches!(
            dict.get_u32("w", 1).unwrap_err(),
            CacheError::BadArguments(_)
        ));
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn source_error_propagates_and_keeps_partial_update() {
        let [k1, k2]: [u64; 2] = keys_in_distinct_slots(4, 2).try_into().unwrap();
        // One row per block; the stream dies after the first block.
        let counting = CountingSource::new(
            MemorySource::new()
                .with_block_rows(1)
                .row(k1, vec![Value::UInt(11)])
                .row(k2, vec![Value::UInt(22)]),
        );
        let dict = CacheDictionary::builder("flaky")
            .attribute("v", AttributeKind::U32, Value::UInt(0))
            .lifetime(600, 600)
            .capacity(4)
            .build(Box::new(FailAfter::new(
                Box::new(Arc::clone(&counting)),
                1,
            )))
            .unwrap();

        let mut out = [0u32; 2];
        let err = dict.get_u32_batch("v", &[k1, k2], &mut out).unwrap_err();
        assert!(err.is_source());
        assert_eq!(counting.calls(), 1);

        // The lock was released on unwind and the row committed before the
        // failure is kept: of the two keys, one answers warm and only the
        // other re-queries (its single-row stream now completes).
        assert_eq!(dict.get_u32("v", k1).unwrap(), 11);
        assert_eq!(dict.get_u32("v", k2).unwrap(), 22);
        assert_eq!(counting.calls(), 2);
    }

    #[test]
    fn malformed_key_column_is_type_mismatch() {
        use dictcache::source::{Block, ColumnData, DictionarySource, RecordStream};

        struct BadKeyColumn;

        struct OneBlock(Option<Block>);

        impl RecordStream for OneBlock {
            fn read(&mut self) -> Result<Option<Block>, CacheError> {
                Ok(self.0.take())
            }
        }

        impl DictionarySource for BadKeyColumn {
            fn supports_selective_load(&self) -> bool {
                true
            }

            fn load_ids(&self, _ids: &[u64]) -> Result<Box<dyn RecordStream + '_>, CacheError> {
                Ok(Box::new(OneBlock(Some(Block::new(vec![
                    ColumnData::Int64(vec![1]),
                    ColumnData::UInt64(vec![7]),
                ])))))
            }

            fn clone_source(&self) -> Box<dyn DictionarySource> {
                Box::new(BadKeyColumn)
            }
        }

        let dict = CacheDictionary::builder("bad")
            .attribute("v", AttributeKind::U32, Value::UInt(0))
            .lifetime(600, 600)
            .capacity(4)
            .build(Box::new(BadKeyColumn))
            .unwrap();

        let err = dict.get_u32("v", 3).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch(_)));
        // The lock was released on unwind; the next call classifies again.
        let err = dict.get_u32("v", 3).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch(_)));
    }
}

// ==============================================
// Model equivalence
// ==============================================

mod model {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    proptest! {
        /// Against a long TTL, any request vector resolves exactly like the
        /// source map with nulls for unknown and zero keys, regardless of
        /// how keys collide in the 8-slot table.
        #[test]
        fn prop_batch_get_matches_source_map(
            keys in prop::collection::vec(0u64..32, 1..40),
        ) {
            let mut reference: HashMap<u64, u32> = HashMap::new();
            let mut source = MemorySource::new().with_block_rows(3);
            for k in 1u64..32 {
                if k % 3 != 0 {
                    let v = (k * 100) as u32;
                    source.insert(k, vec![Value::UInt(u64::from(v))]);
                    reference.insert(k, v);
                }
            }

            let dict = CacheDictionary::builder("model")
                .attribute("v", AttributeKind::U32, Value::UInt(0))
                .lifetime(600, 600)
                .capacity(8)
                .build(Box::new(source))
                .unwrap();

            let mut out = vec![0u32; keys.len()];
            dict.get_u32_batch("v", &keys, &mut out).unwrap();

            prop_assert_eq!(out.len(), keys.len());
            for (i, key) in keys.iter().enumerate() {
                let expected = reference.get(key).copied().unwrap_or(0);
                prop_assert_eq!(out[i], expected, "position {} key {}", i, key);
            }
        }
    }
}

//! Test utilities for property-based testing.
//!
//! Generators for the domain values the Scorer, Store and Engine operate
//! on: probe values (valid and out-of-bounds), opaque identifiers, reading
//! contexts and whole readings. Mirrors the teacher's
//! `test_utils::generators` module shape, adapted from MAC/UUID/firmware
//! generators to soil-sensor domain values.

pub mod generators {
    use crate::domain::{Parameter, Reading, ReadingContext, ReadingValues};
    use proptest::prelude::*;

    /// Opaque sensor `externalId`: safe ASCII, 1-64 chars, the shape
    /// `validators::validate_external_id` accepts.
    pub fn external_id() -> impl Strategy<Value = String> {
        prop::string::string_regex("[A-Za-z0-9_-]{1,64}").expect("valid regex for external_id")
    }

    /// Zone tag used for cross-sensor correlation.
    pub fn zone() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z][a-z0-9-]{0,31}").expect("valid regex for zone")
    }

    /// One of a handful of plausible soil-sensor hardware types.
    pub fn sensor_type() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["soil-10hs", "teros-12", "decagon-5te", "generic-probe"])
            .prop_map(|s| s.to_string())
    }

    /// Valid moisture reading, % VWC, within the Scorer's physical bounds.
    pub fn moisture_value() -> impl Strategy<Value = f64> {
        0.0f64..=100.0
    }

    /// Valid soil temperature, °C, within the Scorer's physical bounds.
    pub fn temperature_value() -> impl Strategy<Value = f64> {
        0.0f64..=60.0
    }

    /// Valid electrical conductivity, mS/cm, within the Scorer's physical bounds.
    pub fn ec_value() -> impl Strategy<Value = f64> {
        0.0f64..=10.0
    }

    /// Valid pH, within the Scorer's physical bounds.
    pub fn ph_value() -> impl Strategy<Value = f64> {
        3.0f64..=10.0
    }

    /// A value for `p` that lies strictly outside its hard physical bounds,
    /// the shape the Scorer classifies as `ImpossibleValue`.
    pub fn impossible_value(p: Parameter) -> impl Strategy<Value = f64> {
        match p {
            Parameter::Moisture => prop_oneof![-1_000.0..-0.001, 100.0001..1_000.0],
            Parameter::Temperature => prop_oneof![-1_000.0..-0.001, 60.0001..1_000.0],
            Parameter::Ec => prop_oneof![-1_000.0..-0.001, 10.0001..1_000.0],
            Parameter::Ph => prop_oneof![-1_000.0..2.9999, 10.0001..1_000.0],
        }
    }

    /// A full set of probe values, each independently present and within
    /// physical bounds, with at least one probe populated.
    pub fn reading_values() -> impl Strategy<Value = ReadingValues> {
        (
            prop::option::of(moisture_value()),
            prop::option::of(temperature_value()),
            prop::option::of(ec_value()),
            prop::option::of(ph_value()),
        )
            .prop_map(|(moisture, temperature, ec, ph)| ReadingValues { moisture, temperature, ec, ph })
            .prop_filter("at least one probe must be present", |v| {
                v.moisture.is_some() || v.temperature.is_some() || v.ec.is_some() || v.ph.is_some()
            })
    }

    /// Optional reading context: air temperature plus the two field-event flags.
    pub fn reading_context() -> impl Strategy<Value = ReadingContext> {
        (
            prop::option::of(-10.0f64..45.0),
            prop::option::of(any::<bool>()),
            prop::option::of(any::<bool>()),
        )
            .prop_map(|(air_temp, is_raining, irrigation_active)| ReadingContext {
                air_temp,
                is_raining,
                irrigation_active,
            })
    }

    /// Epoch-millisecond timestamp in a plausible 2020-2030 range.
    pub fn timestamp_ms() -> impl Strategy<Value = i64> {
        1_577_836_800_000i64..1_924_991_999_000i64
    }

    /// A whole reading with placeholder refs, valid probes and optional
    /// context. `reading_ref`/`sensor_ref` are irrelevant to the Scorer's
    /// own bounds-checking and are overwritten by callers that care.
    pub fn reading() -> impl Strategy<Value = Reading> {
        (timestamp_ms(), reading_values(), reading_context()).prop_map(|(timestamp, values, context)| Reading {
            reading_ref: "r".to_string(),
            sensor_ref: "s".to_string(),
            timestamp,
            values,
            context,
        })
    }

    /// A history of `len` valid readings, newest-first by construction
    /// order (callers decide what "newest" means for their harness).
    pub fn reading_history(len: usize) -> impl Strategy<Value = Vec<Reading>> {
        prop::collection::vec(reading(), len)
    }
}

//! Property tests for the structural diff engine.
//!
//! Covers patch round-trips (directly and through both wire formats),
//! minimality on identical inputs, and exclusion of the volatile timestamp.

use chrono::{NaiveDate, NaiveTime};
use image::{Rgba, RgbaImage};
use nav_extractor::{
    apply, diff, DiffPatch, DistanceUnit, Format, Image, NavigationData, NavigationDirection,
    NavigationDistance, NavigationDuration, NavigationIcon, NavigationTime, Timestamp, Value,
};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Strategies
// ============================================================================

fn arb_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-zA-Z0-9 .·-]{0,24}")
}

fn arb_unit() -> impl Strategy<Value = DistanceUnit> {
    prop_oneof![
        Just(DistanceUnit::Km),
        Just(DistanceUnit::M),
        Just(DistanceUnit::Ft),
        Just(DistanceUnit::Mi),
        Just(DistanceUnit::Yd),
        Just(DistanceUnit::Invalid),
    ]
}

fn arb_distance() -> impl Strategy<Value = NavigationDistance> {
    (arb_text(), -1.0f64..100_000.0, arb_unit()).prop_map(|(display_text, magnitude, unit)| {
        NavigationDistance {
            display_text,
            magnitude,
            unit,
        }
    })
}

fn arb_direction() -> impl Strategy<Value = NavigationDirection> {
    (arb_text(), arb_text(), proptest::option::of(arb_distance())).prop_map(
        |(display_text, rich_text, distance)| NavigationDirection {
            display_text,
            rich_text,
            distance,
        },
    )
}

fn arb_duration() -> impl Strategy<Value = NavigationDuration> {
    (arb_text(), 0u64..200_000).prop_map(|(display_text, secs)| NavigationDuration {
        display_text,
        duration: Duration::from_secs(secs),
    })
}

fn arb_time() -> impl Strategy<Value = NavigationTime> {
    (
        arb_text(),
        proptest::option::of((0u32..24, 0u32..60, 0u32..60)),
        proptest::option::of((2000i32..2100, 1u32..13, 1u32..29)),
        proptest::option::of(arb_duration()),
    )
        .prop_map(|(display_text, time, date, duration)| NavigationTime {
            display_text,
            time_of_day: time.and_then(|(h, m, s)| NaiveTime::from_hms_opt(h, m, s)),
            date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            duration,
        })
}

fn arb_icon() -> impl Strategy<Value = NavigationIcon> {
    proptest::option::of((1u32..4, 1u32..4, any::<[u8; 4]>())).prop_map(|icon| NavigationIcon {
        image: icon.map(|(w, h, color)| Image::new(RgbaImage::from_pixel(w, h, Rgba(color)))),
    })
}

fn arb_data() -> impl Strategy<Value = NavigationData> {
    (
        any::<bool>(),
        any::<bool>(),
        arb_icon(),
        arb_direction(),
        arb_distance(),
        arb_time(),
        arb_text(),
        any::<i64>(),
    )
        .prop_map(
            |(is_rerouting, can_stop, icon, next_direction, remaining_distance, eta, final_destination_text, post_time)| {
                NavigationData {
                    is_rerouting,
                    can_stop,
                    icon,
                    next_direction,
                    remaining_distance,
                    eta,
                    final_destination_text,
                    post_time: Timestamp(post_time),
                }
            },
        )
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Applying diff(a, b) to a reproduces b, ignoring the volatile field.
    #[test]
    fn prop_patch_round_trip(a in arb_data(), b in arb_data()) {
        let patch = diff(&a, &b);
        let mut patched = a.clone();
        apply(&mut patched, &patch).unwrap();

        prop_assert_eq!(&patched, &b);
        // The volatile field is never carried by a patch
        prop_assert_eq!(patched.post_time, a.post_time);
    }

    /// diff(a, a) is empty, even across distinct instances.
    #[test]
    fn prop_self_diff_empty(a in arb_data()) {
        prop_assert!(diff(&a, &a).is_empty());
        prop_assert!(diff(&a, &a.clone()).is_empty());
    }

    /// Instances differing only in the timestamp are equal with an empty diff.
    #[test]
    fn prop_volatile_excluded(a in arb_data(), stamp in any::<i64>()) {
        let mut b = a.clone();
        b.post_time = Timestamp(stamp);

        prop_assert_eq!(&a, &b);
        prop_assert!(diff(&a, &b).is_empty());
    }

    /// Patches survive both wire formats and still apply.
    #[test]
    fn prop_patch_round_trip_over_wire(a in arb_data(), b in arb_data()) {
        let patch = diff(&a, &b);

        for format in [Format::Text, Format::Binary] {
            let bytes = format.encode(&patch).unwrap();
            let decoded: DiffPatch = format.decode(&bytes).unwrap();
            prop_assert_eq!(&decoded, &patch);

            let mut patched = a.clone();
            apply(&mut patched, &decoded).unwrap();
            prop_assert_eq!(&patched, &b);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_single_leaf_change_is_minimal() {
    let a = NavigationData::default();
    let mut b = a.clone();
    b.remaining_distance.magnitude = 1.5;

    let patch = diff(&a, &b);
    assert_eq!(patch.len(), 1);
    let nested = patch["remainingDistance"].as_map().unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested["magnitude"], Value::Float(1.5));
}

#[test]
fn test_icon_change_by_pixels_only() {
    let red = || Image::new(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));

    let mut a = NavigationData::default();
    a.icon.image = Some(red());
    let mut b = NavigationData::default();
    b.icon.image = Some(red());
    assert!(diff(&a, &b).is_empty());

    b.icon.image = Some(Image::new(RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]))));
    let patch = diff(&a, &b);
    assert!(matches!(
        patch["icon"].as_map().unwrap()["image"],
        Value::Image(_)
    ));
}

//! Property tests for processing-style resolution
//!
//! Every configured `(element, width)` pair must resolve to exactly the
//! extension that declared it, and every other vector width must fail
//! without degrading to scalar.

use proptest::prelude::*;
use std::collections::BTreeSet;
use vectorhal_backends::{BackendError, ElementType, ExtensionSpec, ExtensionTable};

const WIDTH_POOL: [usize; 8] = [16, 32, 64, 128, 256, 512, 1024, 2048];

fn table_for(widths: &BTreeSet<usize>) -> ExtensionTable {
    let specs = widths
        .iter()
        .map(|&w| ExtensionSpec::new(format!("ext{w}"), w, &[]))
        .collect();
    ExtensionTable::new(specs).unwrap()
}

fn fits(element: ElementType, width_bits: usize) -> bool {
    width_bits > element.bits() && width_bits % element.bits() == 0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn configured_widths_resolve_exactly(widths in prop::collection::btree_set(prop::sample::select(WIDTH_POOL.to_vec()), 0..WIDTH_POOL.len())) {
        let table = table_for(&widths);

        for element in ElementType::ALL {
            for &w in widths.iter().filter(|&&w| fits(element, w)) {
                let style = table.resolve_width(element, w).unwrap();
                prop_assert_eq!(style.extension().as_str(), format!("ext{w}"));
                prop_assert_eq!(style.width_bits(), w);
                prop_assert_eq!(style.element(), element);

                let lanes = w / element.bits();
                let by_lanes = table.resolve(element, lanes).unwrap();
                prop_assert_eq!(by_lanes, style);
            }
        }
    }

    #[test]
    fn unconfigured_widths_never_fall_back(widths in prop::collection::btree_set(prop::sample::select(WIDTH_POOL.to_vec()), 0..WIDTH_POOL.len())) {
        let table = table_for(&widths);

        for element in ElementType::ALL {
            for &w in WIDTH_POOL.iter().filter(|&&w| !widths.contains(&w) && w != element.bits()) {
                match table.resolve_width(element, w) {
                    Err(BackendError::UnsupportedVectorLength { element: e, width_bits }) => {
                        prop_assert_eq!(e, element);
                        prop_assert_eq!(width_bits, w);
                    }
                    other => prop_assert!(false, "{element} at {w} bits resolved to {other:?}"),
                }
            }
        }
    }

    #[test]
    fn parallelism_one_is_always_scalar(widths in prop::collection::btree_set(prop::sample::select(WIDTH_POOL.to_vec()), 0..WIDTH_POOL.len())) {
        let table = table_for(&widths);
        for element in ElementType::ALL {
            let style = table.resolve(element, 1).unwrap();
            prop_assert!(style.is_scalar());
            prop_assert_eq!(style.vector_element_count(), 1);
            prop_assert_eq!(table.available_parallelism(element)[0], 1);
        }
    }
}

#[test]
fn widest_and_narrowest_follow_configuration() {
    let table = ExtensionTable::new(vec![
        ExtensionSpec::new("narrow", 128, &[]),
        ExtensionSpec::new("wide", 512, &[]),
    ])
    .unwrap();

    assert_eq!(table.widest(ElementType::F32).extension().as_str(), "wide");
    assert_eq!(table.narrowest(ElementType::F32).extension().as_str(), "narrow");
    assert_eq!(table.available_parallelism(ElementType::F32), vec![1, 4, 16]);

    let empty = ExtensionTable::scalar_only();
    assert!(empty.widest(ElementType::U8).is_scalar());
}

#[test]
fn json_table_round_trips_through_document() {
    let json = r#"{"extensions": [
        {"name": "neon", "width_bits": 128, "cpu_flags": ["neon"]},
        {"name": "wide_f", "width_bits": 256, "element_types": ["f32", "f64"]}
    ]}"#;
    let table = ExtensionTable::from_json_str(json).unwrap();

    assert!(table.resolve(ElementType::F64, 4).is_ok());
    assert!(matches!(
        table.resolve(ElementType::U32, 8),
        Err(BackendError::UnsupportedVectorLength { .. })
    ));

    let text = serde_json::to_string(&table.to_document()).unwrap();
    let reparsed = ExtensionTable::from_json_str(&text).unwrap();
    assert_eq!(reparsed.extensions(), table.extensions());
}

//! Config layer composition.
//!
//! Mappings merge key-by-key, deeply. Arrays are **replaced**, never
//! concatenated: a layer that sets `blocklist` owns the whole list. (The
//! template-include path concatenates and dedups instead; that layer is
//! outside this crate.)

use serde_yaml::Value;

/// Overlay `overlay` onto `base`, returning the composed value.
#[must_use]
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        // Scalars, sequences, and mismatched shapes: the overlay wins.
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn scalars_are_overridden() {
        let merged = merge_values(yaml("a: 1\nb: 2"), yaml("b: 3"));
        assert_eq!(merged, yaml("a: 1\nb: 3"));
    }

    #[test]
    fn mappings_merge_deeply() {
        let merged = merge_values(
            yaml("rules:\n  website:\n    severity: high\n    mode: blocklist"),
            yaml("rules:\n  website:\n    severity: critical"),
        );
        assert_eq!(
            merged,
            yaml("rules:\n  website:\n    severity: critical\n    mode: blocklist")
        );
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let merged = merge_values(
            yaml("blocklist: [a.com, b.com]"),
            yaml("blocklist: [c.com]"),
        );
        assert_eq!(merged, yaml("blocklist: [c.com]"));
    }

    #[test]
    fn overlay_keys_are_added() {
        let merged = merge_values(yaml("a: 1"), yaml("b: {c: 2}"));
        assert_eq!(merged, yaml("a: 1\nb: {c: 2}"));
    }

    #[test]
    fn mismatched_shapes_take_the_overlay() {
        let merged = merge_values(yaml("a: {x: 1}"), yaml("a: [1, 2]"));
        assert_eq!(merged, yaml("a: [1, 2]"));
    }
}

//! Optional chart input transform: strip animation directives.
//!
//! Chart descriptions are opaque to the coordinator except for this one
//! narrow rewrite: when enabled, JSON inputs get their animation-driving
//! keys removed before being served, so the render reaches its final
//! frame without the intro sweep and settles sooner. Anything that does
//! not parse as JSON passes through untouched.

use serde_json::Value;

/// Keys that make a chart animate before reaching its final frame.
const ANIMATION_KEYS: [&str; 3] = ["animate", "on-show", "on_show"];

/// Remove animation keys from a JSON chart description. Non-JSON input
/// is returned as-is.
pub fn strip_animation(input: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<Value>(input) {
        Ok(mut value) => {
            strip_keys(&mut value);
            serde_json::to_vec(&value).unwrap_or_else(|_| input.to_vec())
        }
        Err(_) => input.to_vec(),
    }
}

fn strip_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in ANIMATION_KEYS {
                map.remove(key);
            }
            for child in map.values_mut() {
                strip_keys(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_keys(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_strips_top_level_animation_keys() {
        let input = br#"{"title": {"text": "Sales"}, "animate": true}"#;
        let out = parse(&strip_animation(input));
        assert!(out.get("animate").is_none());
        assert_eq!(out["title"]["text"], "Sales");
    }

    #[test]
    fn test_strips_nested_keys_in_elements() {
        let input = br#"{
            "elements": [
                {"type": "bar", "on-show": {"type": "pop", "cascade": 1}},
                {"type": "line", "on_show": {"type": "shrink-in"}, "width": 2}
            ]
        }"#;
        let out = parse(&strip_animation(input));
        assert!(out["elements"][0].get("on-show").is_none());
        assert!(out["elements"][1].get("on_show").is_none());
        assert_eq!(out["elements"][0]["type"], "bar");
        assert_eq!(out["elements"][1]["width"], 2);
    }

    #[test]
    fn test_non_json_passes_through() {
        let input = b"\x89PNG not json at all";
        assert_eq!(strip_animation(input), input.to_vec());
    }

    #[test]
    fn test_json_scalar_passes_through() {
        let input = br"42";
        assert_eq!(parse(&strip_animation(input)), Value::from(42));
    }

    #[test]
    fn test_untouched_keys_survive() {
        let input = br##"{"x_axis": {"labels": ["a", "b"]}, "bg_colour": "#ffffff"}"##;
        let out = parse(&strip_animation(input));
        assert_eq!(out["x_axis"]["labels"][1], "b");
        assert_eq!(out["bg_colour"], "#ffffff");
    }
}

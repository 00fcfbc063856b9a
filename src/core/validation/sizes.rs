//! Size normalization. Publisher integrations send sizes in every shape
//! the ecosystem has ever invented; everything is folded down to a flat
//! list of positive `[w,h]` pairs. Unparseable entries are skipped with
//! a warning rather than failing the slot.

use crate::core::spec::openrtb::Format;
use serde_json::Value;
use tracing::warn;

fn as_positive_u32(v: &Value) -> Option<u32> {
    let n = v.as_u64().or_else(|| v.as_f64().map(|f| f as u64))?;

    if n == 0 || n > u32::MAX as u64 {
        return None;
    }

    Some(n as u32)
}

fn parse_entry(value: &Value) -> Option<Format> {
    match value {
        // "300x250"
        Value::String(s) => {
            let (w, h) = s.trim().split_once(['x', 'X'])?;

            let w: u32 = w.trim().parse().ok()?;
            let h: u32 = h.trim().parse().ok()?;

            (w > 0 && h > 0).then_some(Format { w, h })
        }
        // [300, 250]
        Value::Array(items) if items.len() == 2 => {
            let w = as_positive_u32(&items[0])?;
            let h = as_positive_u32(&items[1])?;

            Some(Format { w, h })
        }
        // {w, h} or {width, height}
        Value::Object(map) => {
            let w = map.get("w").or_else(|| map.get("width"))?;
            let h = map.get("h").or_else(|| map.get("height"))?;

            Some(Format {
                w: as_positive_u32(w)?,
                h: as_positive_u32(h)?,
            })
        }
        _ => None,
    }
}

/// Accepts `[[w,h],…]`, `[w,h]`, `"WxH"`, `{w,h}`, `{width,height}`, or
/// arrays mixing those. Idempotent: feeding the output back in yields
/// the same list.
pub fn normalize_sizes(value: &Value) -> Vec<Format> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => {
            // bare [w,h] vs a list of entries
            if items.len() == 2 && items.iter().all(Value::is_number) {
                vec![value]
            } else {
                items.iter().collect()
            }
        }
        _ => vec![value],
    };

    let mut out = Vec::with_capacity(entries.len());

    for entry in entries {
        match parse_entry(entry) {
            Some(format) => out.push(format),
            None => warn!("Skipping unparseable size entry: {}", entry),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_every_shape() {
        let expected = vec![Format { w: 300, h: 250 }];

        assert_eq!(normalize_sizes(&json!([[300, 250]])), expected);
        assert_eq!(normalize_sizes(&json!([300, 250])), expected);
        assert_eq!(normalize_sizes(&json!("300x250")), expected);
        assert_eq!(normalize_sizes(&json!("300X250")), expected);
        assert_eq!(normalize_sizes(&json!({"w": 300, "h": 250})), expected);
        assert_eq!(
            normalize_sizes(&json!({"width": 300, "height": 250})),
            expected
        );
    }

    #[test]
    fn test_mixed_array_of_shapes() {
        let sizes = normalize_sizes(&json!([
            [728, 90],
            "300x250",
            {"w": 160, "h": 600}
        ]));

        assert_eq!(
            sizes,
            vec![
                Format { w: 728, h: 90 },
                Format { w: 300, h: 250 },
                Format { w: 160, h: 600 },
            ]
        );
    }

    #[test]
    fn test_garbage_entries_skipped() {
        let sizes = normalize_sizes(&json!([[300, 250], "banana", [0, 90], [-1, 5], null]));
        assert_eq!(sizes, vec![Format { w: 300, h: 250 }]);
    }

    #[test]
    fn test_all_garbage_yields_empty() {
        assert!(normalize_sizes(&json!("wide")).is_empty());
        assert!(normalize_sizes(&json!(42)).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let first = normalize_sizes(&json!([[300, 250], "728x90"]));

        let as_pairs: Vec<Vec<u32>> = first.iter().map(|f| vec![f.w, f.h]).collect();
        let second = normalize_sizes(&serde_json::to_value(as_pairs).unwrap());
        assert_eq!(first, second);

        // object form round-trips the same way
        let as_objects = serde_json::to_value(&first).unwrap();
        assert_eq!(normalize_sizes(&as_objects), first);
    }
}

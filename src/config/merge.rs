//! Recursive merge of settings objects.
//!
//! The merge is right-biased: where both sides carry a key and at least one
//! value is not an object, the overlay wins.  Arrays are scalars for this
//! purpose and are replaced wholesale, never concatenated.
use serde_json::{Map, Value};

/// Merge `overlay` into `base`, returning a new map.
///
/// - keys only in `base` are kept as-is;
/// - keys only in `overlay` are added;
/// - keys in both recurse when both values are objects, otherwise the
///   overlay value replaces the base value.
///
/// Key order follows `base` first, then keys new in `overlay` in their
/// original order.
///
/// # Examples
///
/// ```
/// use devkit_installer::config::merge::merge;
/// use serde_json::json;
///
/// let base = json!({"custom": true, "hooks": []});
/// let overlay = json!({"hooks": {"PreToolUse": []}});
/// let merged = merge(base.as_object().unwrap(), overlay.as_object().unwrap());
///
/// assert_eq!(
///     serde_json::Value::Object(merged),
///     json!({"custom": true, "hooks": {"PreToolUse": []}})
/// );
/// ```
#[must_use]
pub fn merge(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    merge_into(&mut out, overlay);
    out
}

/// In-place form of [`merge`].
pub fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Fold a sequence of overlays onto `base` left to right.
#[must_use]
pub fn merge_all<'a>(
    base: &Map<String, Value>,
    overlays: impl IntoIterator<Item = &'a Map<String, Value>>,
) -> Map<String, Value> {
    let mut out = base.clone();
    for overlay in overlays {
        merge_into(&mut out, overlay);
    }
    out
}

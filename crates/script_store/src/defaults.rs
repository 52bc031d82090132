//! Recursive default merging for JSON documents.

use serde_json::Value;

/// Fills keys missing from `target` with the corresponding entries of `defaults`.
///
/// Objects present on both sides are merged recursively. Present values are never replaced, not
/// even `null`. Arrays and scalars are taken as a whole. Does nothing unless both sides are
/// objects.
pub fn defaults_deep(target: &mut Value, defaults: &Value) {
    let (Value::Object(target), Value::Object(defaults)) = (target, defaults) else {
        return;
    };
    for (key, default) in defaults {
        match target.get_mut(key) {
            Some(existing) => defaults_deep(existing, default),
            None => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

//! Flattening of the loosely structured `artifacts` tree

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One artifact stanza: directive name to its list of entries.
pub type ArtifactStanza = BTreeMap<String, Vec<Value>>;

/// Shapes the flattener recognizes. Everything else is a scalar and dropped.
enum RawArtifactNode<'a> {
    Map(&'a Map<String, Value>),
    /// A two element list whose head is a string: `["app", "Foo.app"]`
    Pair(&'a str, &'a Value),
    List(&'a [Value]),
    Scalar,
}

impl<'a> From<&'a Value> for RawArtifactNode<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(map),
            Value::Array(items) => match items.as_slice() {
                [Value::String(key), value] => Self::Pair(key, value),
                _ => Self::List(items),
            },
            _ => Self::Scalar,
        }
    }
}

/// Flatten an artifacts tree into stanzas.
///
/// Non-empty maps are kept, `[key, value]` pairs become one-entry stanzas
/// (a non-list value is wrapped), other lists are walked in order and
/// scalars and empty maps are dropped. Never fails.
pub fn flatten(node: &Value) -> Vec<ArtifactStanza> {
    let mut stanzas = Vec::new();
    walk(node, &mut stanzas);
    stanzas
}

fn walk(node: &Value, stanzas: &mut Vec<ArtifactStanza>) {
    match RawArtifactNode::from(node) {
        RawArtifactNode::Map(map) => {
            if !map.is_empty() {
                stanzas.push(
                    map.iter()
                        .map(|(key, value)| (key.clone(), ensure_list(value)))
                        .collect(),
                );
            }
        }
        RawArtifactNode::Pair(key, value) => {
            let mut stanza = ArtifactStanza::new();
            stanza.insert(key.to_string(), ensure_list(value));
            stanzas.push(stanza);
        }
        RawArtifactNode::List(items) => {
            for item in items {
                walk(item, stanzas);
            }
        }
        RawArtifactNode::Scalar => {}
    }
}

/// `null` -> `[]`, list -> itself, anything else -> `[value]`
pub fn ensure_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_pair() {
        let stanzas = flatten(&json!(["app", "Foo.app"]));
        assert_eq!(stanzas.len(), 1);
        assert_eq!(stanzas[0]["app"], vec![json!("Foo.app")]);
    }

    #[test]
    fn test_flatten_mixed_tree() {
        let tree = json!([
            {"app": ["Foo.app"]},
            {},
            42,
            [["pkg", ["Foo.pkg"]], {"uninstall": [{"quit": "com.foo"}]}],
        ]);
        let stanzas = flatten(&tree);
        let keys: Vec<_> = stanzas
            .iter()
            .flat_map(|s| s.keys().cloned())
            .collect();
        assert_eq!(keys, vec!["app", "pkg", "uninstall"]);
        assert_eq!(stanzas[1]["pkg"], vec![json!("Foo.pkg")]);
    }

    #[test]
    fn test_flatten_scalars_and_malformed_input() {
        assert!(flatten(&json!(null)).is_empty());
        assert!(flatten(&json!("app")).is_empty());
        assert!(flatten(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_ensure_list() {
        assert!(ensure_list(&json!(null)).is_empty());
        assert_eq!(ensure_list(&json!("x")), vec![json!("x")]);
        assert_eq!(ensure_list(&json!(["x", "y"])).len(), 2);
    }
}

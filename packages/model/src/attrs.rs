use serde_json::Value;
use std::collections::BTreeMap;

/// Node and mark attributes. Ordered so serialization is deterministic.
pub type Attrs = BTreeMap<String, Value>;

/// Build an attribute map from key/value pairs
pub fn attrs<K, V, I>(pairs: I) -> Attrs
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub(crate) fn attr_str<'a>(attrs: &'a Attrs, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(Value::as_str)
}

pub(crate) fn attr_u64(attrs: &Attrs, name: &str) -> Option<u64> {
    attrs.get(name).and_then(Value::as_u64)
}

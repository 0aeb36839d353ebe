//! A single jCal property: `[name, {params}, type, value, ...more values]`

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{PollError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct JcalProperty {
    name: String,
    params: Map<String, Value>,
    value_type: String,
    values: Vec<Value>,
}

impl JcalProperty {
    /// Create a single-valued property. The name is stored lower-cased, as jCal requires
    pub fn new<S: AsRef<str>, V: Into<Value>>(name: S, params: Map<String, Value>, value_type: &str, value: V) -> Self {
        Self::with_values(name, params, value_type, vec![value.into()])
    }

    pub fn with_values<S: AsRef<str>>(name: S, params: Map<String, Value>, value_type: &str, values: Vec<Value>) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            params,
            value_type: value_type.to_string(),
            values,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn value_type(&self) -> &str { &self.value_type }
    pub fn params(&self) -> &Map<String, Value> { &self.params }
    pub fn params_mut(&mut self) -> &mut Map<String, Value> { &mut self.params }
    pub fn values(&self) -> &[Value] { &self.values }

    /// The first value of this property
    pub fn value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    /// The first value as an integer. Integers that were stored as text are accepted too
    pub fn value_i64(&self) -> Option<i64> {
        match self.value()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    pub fn set_param<V: Into<Value>>(&mut self, name: &str, value: V) {
        self.params.insert(name.to_string(), value.into());
    }

    pub fn remove_param(&mut self, name: &str) -> Option<Value> {
        self.params.remove(name)
    }

    /// Replace every value with a single one
    pub fn set_value<V: Into<Value>>(&mut self, value: V) {
        self.values = vec![value.into()];
    }

    pub fn set_value_type(&mut self, value_type: &str) {
        self.value_type = value_type.to_string();
    }

    /// Take over the parameters, type and values of `other`, keeping this property's name
    pub fn update_from(&mut self, other: &JcalProperty) {
        self.params = other.params.clone();
        self.value_type = other.value_type.clone();
        self.values = other.values.clone();
    }
}

impl Serialize for JcalProperty {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3 + self.values.len()))?;
        seq.serialize_element(&self.name)?;
        seq.serialize_element(&self.params)?;
        seq.serialize_element(&self.value_type)?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for JcalProperty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        JcalProperty::from_raw(raw).map_err(D::Error::custom)
    }
}

impl JcalProperty {
    fn from_raw(raw: Vec<Value>) -> Result<Self> {
        let mut items = raw.into_iter();
        let name = match items.next() {
            Some(Value::String(name)) => name,
            other => return Err(PollError::Serialization(format!("property name must be a string, got {:?}", other))),
        };
        let params = match items.next() {
            Some(Value::Object(params)) => params,
            other => return Err(PollError::Serialization(format!("parameters of {} must be an object, got {:?}", name, other))),
        };
        let value_type = match items.next() {
            Some(Value::String(value_type)) => value_type,
            other => return Err(PollError::Serialization(format!("value type of {} must be a string, got {:?}", name, other))),
        };

        Ok(Self {
            name: name.to_lowercase(),
            params,
            value_type,
            values: items.collect(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multiple_values_are_flattened() {
        let prop = JcalProperty::with_values("POLL-PROPERTIES", Map::new(), "text", vec![json!("DTSTART"), json!("DTEND")]);
        assert_eq!(prop.name(), "poll-properties");
        assert_eq!(serde_json::to_value(&prop).unwrap(), json!(["poll-properties", {}, "text", "DTSTART", "DTEND"]));
    }

    #[test]
    fn integers_stored_as_text() {
        let prop: JcalProperty = serde_json::from_value(json!(["poll-item-id", {}, "integer", "12"])).unwrap();
        assert_eq!(prop.value_i64(), Some(12));
        let prop: JcalProperty = serde_json::from_value(json!(["poll-item-id", {}, "integer", 7])).unwrap();
        assert_eq!(prop.value_i64(), Some(7));
    }

    #[test]
    fn rejects_truncated_properties() {
        assert!(serde_json::from_value::<JcalProperty>(json!(["summary", {}])).is_err());
        assert!(serde_json::from_value::<JcalProperty>(json!(["summary", "text", "x"])).is_err());
    }
}

//! A raw jCal component: `[name, [properties], [sub-components]]`

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{PollError, Result};
use crate::jcal::JcalProperty;

#[derive(Clone, Debug, PartialEq)]
pub struct JcalComponent {
    name: String,
    properties: Vec<JcalProperty>,
    components: Vec<JcalComponent>,
    /// Written as `[name, [properties]]` while it has no sub-components, the way jCard objects are
    short_form: bool,
}

impl JcalComponent {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        let name = name.as_ref().to_lowercase();
        let short_form = name == "vcard";
        Self {
            name,
            properties: Vec::new(),
            components: Vec::new(),
            short_form,
        }
    }

    /// Create a component that already carries a fresh UID and a DTSTAMP
    pub fn with_defaults<S: AsRef<str>>(name: S) -> Self {
        let mut comp = Self::new(name);
        let uid = uuid::Uuid::new_v4().to_hyphenated().to_string();
        comp.update_property("uid", uid, Map::new(), "text");
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        comp.update_property("dtstamp", stamp, Map::new(), "date-time");
        comp
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn properties(&self) -> &[JcalProperty] { &self.properties }
    pub fn components(&self) -> &[JcalComponent] { &self.components }

    pub fn is_event(&self) -> bool { self.name == "vevent" }
    pub fn is_task(&self) -> bool { self.name == "vtodo" }

    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a JcalProperty> + 'a {
        self.properties.iter().filter(move |p| p.name() == name)
    }

    pub fn properties_named_mut<'a>(&'a mut self, name: &'a str) -> impl Iterator<Item = &'a mut JcalProperty> + 'a {
        self.properties.iter_mut().filter(move |p| p.name() == name)
    }

    /// The first property with this name
    pub fn get_property(&self, name: &str) -> Option<&JcalProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn get_property_mut(&mut self, name: &str) -> Option<&mut JcalProperty> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    pub fn get_property_value(&self, name: &str) -> Option<&Value> {
        self.get_property(name)?.value()
    }

    pub fn get_property_text(&self, name: &str) -> Option<&str> {
        self.get_property(name)?.value_str()
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }

    /// Append a property, even if others with the same name exist
    pub fn push_property(&mut self, prop: JcalProperty) -> &mut JcalProperty {
        self.properties.push(prop);
        let last = self.properties.len() - 1;
        &mut self.properties[last]
    }

    pub fn new_property<V: Into<Value>>(&mut self, name: &str, value: V, params: Map<String, Value>, value_type: &str) -> &mut JcalProperty {
        self.push_property(JcalProperty::new(name, params, value_type, value))
    }

    /// Set the value, parameters and type of the first property with this name, or add it
    pub fn update_property<V: Into<Value>>(&mut self, name: &str, value: V, params: Map<String, Value>, value_type: &str) -> &mut JcalProperty {
        let updated = JcalProperty::new(name, params, value_type, value);
        match self.properties.iter().position(|p| p.name() == updated.name()) {
            Some(index) => {
                self.properties[index].update_from(&updated);
                &mut self.properties[index]
            },
            None => self.push_property(updated),
        }
    }

    /// Remove every property with this name. Returns how many were removed
    pub fn remove_properties(&mut self, name: &str) -> usize {
        let before = self.properties.len();
        self.properties.retain(|p| p.name() != name);
        before - self.properties.len()
    }

    /// Copy the first property called `name` from `other` into this component, replacing ours
    pub fn copy_property(&mut self, name: &str, other: &JcalComponent) -> bool {
        match other.get_property(name) {
            None => false,
            Some(prop) => {
                self.remove_properties(name);
                self.properties.push(prop.clone());
                true
            },
        }
    }

    pub fn add_component(&mut self, comp: JcalComponent) {
        self.components.push(comp);
    }

    /// Create and append a sub-component
    pub fn new_component(&mut self, name: &str, with_defaults: bool) -> &mut JcalComponent {
        let comp = if with_defaults { Self::with_defaults(name) } else { Self::new(name) };
        self.components.push(comp);
        let last = self.components.len() - 1;
        &mut self.components[last]
    }

    pub fn set_components(&mut self, components: Vec<JcalComponent>) {
        self.components = components;
    }

    pub(crate) fn take_components(&mut self) -> Vec<JcalComponent> {
        std::mem::take(&mut self.components)
    }

    /// The first sub-component that is not a timezone definition
    pub fn main_component(&self) -> Option<&JcalComponent> {
        self.components.iter().find(|c| c.name != "vtimezone")
    }
}

/// An empty VCALENDAR, with its VERSION and PRODID set
pub fn new_calendar() -> JcalComponent {
    let mut calendar = JcalComponent::new("vcalendar");
    calendar.update_property("version", "2.0", Map::new(), "text");
    calendar.update_property("prodid", crate::config::default_prod_id(), Map::new(), "text");
    calendar
}

impl Serialize for JcalComponent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.short_form && self.components.is_empty() {
            (&self.name, &self.properties).serialize(serializer)
        } else {
            (&self.name, &self.properties, &self.components).serialize(serializer)
        }
    }
}

/// jCard objects omit the trailing sub-component list
#[derive(Deserialize)]
#[serde(untagged)]
enum RawComponent {
    Full(String, Vec<JcalProperty>, Vec<JcalComponent>),
    Card(String, Vec<JcalProperty>),
}

impl<'de> Deserialize<'de> for JcalComponent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (name, properties, components, short_form) = match RawComponent::deserialize(deserializer)? {
            RawComponent::Full(name, properties, components) => (name, properties, components, false),
            RawComponent::Card(name, properties) => (name, properties, Vec::new(), true),
        };
        Ok(Self { name: name.to_lowercase(), properties, components, short_form })
    }
}

impl FromStr for JcalComponent {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl Display for JcalComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

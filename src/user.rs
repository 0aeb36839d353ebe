//! Calendar users: the value and parameters of ORGANIZER, ATTENDEE and VOTER properties

use serde_json::{Map, Value};

use crate::jcal::JcalProperty;

pub const DEFAULT_CUTYPE: &str = "INDIVIDUAL";
pub const DEFAULT_PARTSTAT: &str = "NEEDS-ACTION";

/// Read access to a calendar-user property
#[derive(Clone, Copy, Debug)]
pub struct CalendarUser<'a> {
    prop: &'a JcalProperty,
}

impl<'a> CalendarUser<'a> {
    pub fn new(prop: &'a JcalProperty) -> Self {
        Self { prop }
    }

    pub fn property(&self) -> &'a JcalProperty { self.prop }

    /// The calendar user address, e.g. `mailto:jane@example.com`
    pub fn cuaddr(&self) -> &'a str {
        self.prop.value_str().unwrap_or("")
    }

    pub fn cn(&self) -> Option<&'a str> { self.prop.param_str("cn") }

    pub fn cutype(&self) -> &'a str {
        self.prop.param_str("cutype").unwrap_or(DEFAULT_CUTYPE)
    }

    pub fn partstat(&self) -> &'a str {
        self.prop.param_str("partstat").unwrap_or(DEFAULT_PARTSTAT)
    }

    pub fn rsvp(&self) -> bool {
        self.prop.param_str("rsvp").map(|rsvp| rsvp.eq_ignore_ascii_case("true")).unwrap_or(false)
    }

    /// The RESPONSE parameter (a vote carried on the property itself)
    pub fn response(&self) -> Option<i64> {
        match self.prop.params().get("response")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The common name if there is one, else the address without its `mailto:` scheme
    pub fn name_or_address(&self) -> &'a str {
        match self.cn() {
            Some(cn) if !cn.trim().is_empty() => cn,
            _ => strip_mailto(self.cuaddr()),
        }
    }

    pub fn address_description(&self) -> String {
        address_description(self.cn(), self.cuaddr())
    }
}

/// Write access to a calendar-user property. Setting a parameter to its default removes it
#[derive(Debug)]
pub struct CalendarUserMut<'a> {
    prop: &'a mut JcalProperty,
}

impl<'a> CalendarUserMut<'a> {
    pub fn new(prop: &'a mut JcalProperty) -> Self {
        Self { prop }
    }

    pub fn as_user(&self) -> CalendarUser<'_> {
        CalendarUser::new(self.prop)
    }

    /// Replace the address and every parameter
    pub fn update(&mut self, cuaddr: &str, params: Map<String, Value>) {
        self.prop.set_value(cuaddr);
        *self.prop.params_mut() = params;
    }

    pub fn update_from(&mut self, other: &JcalProperty) {
        self.prop.update_from(other);
    }

    pub fn set_cuaddr(&mut self, cuaddr: &str) {
        self.prop.set_value(cuaddr);
    }

    pub fn set_cn(&mut self, cn: Option<&str>) {
        match cn.map(str::trim).filter(|cn| !cn.is_empty()) {
            Some(cn) => self.prop.set_param("cn", cn),
            None => { self.prop.remove_param("cn"); },
        }
    }

    pub fn set_cutype(&mut self, cutype: &str) {
        self.set_or_default("cutype", cutype, DEFAULT_CUTYPE);
    }

    pub fn set_partstat(&mut self, partstat: &str) {
        self.set_or_default("partstat", partstat, DEFAULT_PARTSTAT);
    }

    pub fn set_rsvp(&mut self, rsvp: bool) {
        if rsvp {
            self.prop.set_param("rsvp", "TRUE");
        } else {
            self.prop.remove_param("rsvp");
        }
    }

    pub fn set_response(&mut self, response: Option<i64>) {
        match response {
            Some(response) => self.prop.set_param("response", response),
            None => { self.prop.remove_param("response"); },
        }
    }

    /// Set the name and address from text such as `Jane Doe <mailto:jane@example.com>`
    pub fn set_address_description(&mut self, text: &str) {
        let (cn, cuaddr) = split_address_description(text);
        self.set_cn(cn.as_deref());
        self.set_cuaddr(&cuaddr);
    }

    fn set_or_default(&mut self, name: &str, value: &str, default: &str) {
        if value.eq_ignore_ascii_case(default) {
            self.prop.remove_param(name);
        } else {
            self.prop.set_param(name, value.to_uppercase());
        }
    }
}

fn strip_mailto(cuaddr: &str) -> &str {
    match cuaddr.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => &cuaddr[7..],
        _ => cuaddr,
    }
}

/// `Jane Doe <mailto:jane@example.com>`, or just the address when there is no name
pub fn address_description(cn: Option<&str>, cuaddr: &str) -> String {
    match cn.map(str::trim).filter(|cn| !cn.is_empty()) {
        Some(cn) => format!("{} <{}>", cn, cuaddr),
        None => cuaddr.to_string(),
    }
}

/// The reverse of [`address_description`]. A bare e-mail address gets a `mailto:` scheme
pub fn split_address_description(text: &str) -> (Option<String>, String) {
    let text = text.trim();
    let (cn, addr) = match (text.rfind('<'), text.ends_with('>')) {
        (Some(open), true) => {
            let cn = text[..open].trim().trim_matches('"').trim();
            let cn = if cn.is_empty() { None } else { Some(cn.to_string()) };
            (cn, text[open + 1..text.len() - 1].trim())
        },
        _ => (None, text),
    };

    let addr = if !addr.contains(':') && addr.contains('@') {
        format!("mailto:{}", addr)
    } else {
        addr.to_string()
    };
    (cn, addr)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attendee() -> JcalProperty {
        serde_json::from_value(json!(["attendee", {"cn": "Jane Doe", "partstat": "ACCEPTED"}, "cal-address", "mailto:jane@example.com"])).unwrap()
    }

    #[test]
    fn read_defaults() {
        let prop = attendee();
        let user = CalendarUser::new(&prop);
        assert_eq!(user.cutype(), "INDIVIDUAL");
        assert_eq!(user.partstat(), "ACCEPTED");
        assert!(!user.rsvp());
        assert_eq!(user.name_or_address(), "Jane Doe");
        assert_eq!(user.address_description(), "Jane Doe <mailto:jane@example.com>");
    }

    #[test]
    fn defaults_are_not_stored() {
        let mut prop = attendee();
        {
            let mut user = CalendarUserMut::new(&mut prop);
            user.set_partstat("NEEDS-ACTION");
            user.set_cutype("individual");
            user.set_rsvp(true);
        }
        assert_eq!(prop.params(), json!({"cn": "Jane Doe", "rsvp": "TRUE"}).as_object().unwrap());

        CalendarUserMut::new(&mut prop).set_rsvp(false);
        CalendarUserMut::new(&mut prop).set_cutype("ROOM");
        assert_eq!(prop.params(), json!({"cn": "Jane Doe", "cutype": "ROOM"}).as_object().unwrap());
    }

    #[test]
    fn address_descriptions() {
        assert_eq!(split_address_description("Jane Doe <mailto:jane@example.com>"), (Some("Jane Doe".to_string()), "mailto:jane@example.com".to_string()));
        assert_eq!(split_address_description("joe@example.com"), (None, "mailto:joe@example.com".to_string()));
        assert_eq!(split_address_description("urn:uuid:1234"), (None, "urn:uuid:1234".to_string()));

        let mut prop = attendee();
        CalendarUserMut::new(&mut prop).set_address_description("<joe@example.com>");
        let user = CalendarUser::new(&prop);
        assert_eq!(user.cn(), None);
        assert_eq!(user.cuaddr(), "mailto:joe@example.com");
        assert_eq!(user.name_or_address(), "joe@example.com");
    }
}

//! Calendar collections, as exposed by a CalDAV server

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use url::Url;

bitflags! {
    #[derive(Serialize, Deserialize)]
    pub struct SupportedComponents: u8 {
        /// An event, such as a calendar meeting
        const EVENT = 1;
        /// A to-do item, such as a reminder
        const TODO = 2;
        /// A scheduling poll
        const POLL = 4;
    }
}

impl SupportedComponents {
    /// Build flags out of component names, as found in a `supported-calendar-component-set`
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = Self::empty();
        for name in names {
            match name.as_ref().to_uppercase().as_str() {
                "VEVENT" => flags.insert(Self::EVENT),
                "VTODO" => flags.insert(Self::TODO),
                "VPOLL" => flags.insert(Self::POLL),
                other => {
                    log::warn!("Unimplemented supported component type: {:?}. Ignoring it", other);
                },
            };
        }
        flags
    }
}

/// A calendar collection on the server. Resources are created inside it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarCollection {
    url: Url,
    display_name: String,
    add_member: Option<Url>,
    supported_components: SupportedComponents,
}

impl CalendarCollection {
    pub fn new(url: Url, display_name: Option<String>, supported_components: SupportedComponents) -> Self {
        let display_name = display_name.unwrap_or_else(|| basename(&url));
        Self { url, display_name, add_member: None, supported_components }
    }

    /// Use the RFC 5995 `add-member` URL when creating resources in this collection
    pub fn with_add_member(mut self, add_member: Url) -> Self {
        self.add_member = Some(add_member);
        self
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn display_name(&self) -> &str { &self.display_name }
    pub fn add_member(&self) -> Option<&Url> { self.add_member.as_ref() }
    pub fn supported_components(&self) -> SupportedComponents { self.supported_components }

    pub fn supports_polls(&self) -> bool { self.supported_components.contains(SupportedComponents::POLL) }
    pub fn supports_events(&self) -> bool { self.supported_components.contains(SupportedComponents::EVENT) }
    pub fn supports_tasks(&self) -> bool { self.supported_components.contains(SupportedComponents::TODO) }

    /// The URL of a resource named `name` inside this collection
    pub fn child_url(&self, name: &str) -> Result<Url, url::ParseError> {
        let mut base = self.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(name)
    }
}

/// The last non-empty segment of a URL path
fn basename(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("")
        .to_string()
}

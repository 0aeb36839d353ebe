//! The authenticated CalDAV principal, and the calendars it can write to

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarCollection;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    href: String,
    cn: Option<String>,
    calendar_user_addresses: Vec<String>,

    poll_calendars: Vec<CalendarCollection>,
    event_calendars: Vec<CalendarCollection>,
    task_calendars: Vec<CalendarCollection>,
    /// Index into `event_calendars`
    default_event_calendar: Option<usize>,
}

impl Principal {
    pub fn new<S: Into<String>>(href: S, cn: Option<String>, calendar_user_addresses: Vec<String>) -> Self {
        Self {
            href: href.into(),
            cn,
            calendar_user_addresses,
            poll_calendars: Vec::new(),
            event_calendars: Vec::new(),
            task_calendars: Vec::new(),
            default_event_calendar: None,
        }
    }

    pub fn href(&self) -> &str { &self.href }
    pub fn cn(&self) -> Option<&str> { self.cn.as_deref() }
    pub fn calendar_user_addresses(&self) -> &[String] { &self.calendar_user_addresses }

    /// The address this principal uses when creating polls or voting
    pub fn default_address(&self) -> Option<&str> {
        best_cu_address(&self.calendar_user_addresses)
    }

    /// Whether `cuaddr` is one of this principal's calendar user addresses
    pub fn matching_address(&self, cuaddr: &str) -> bool {
        self.calendar_user_addresses.iter().any(|addr| addr == cuaddr)
    }

    /// Register a collection in the poll, event and task lists it qualifies for.
    /// An event collection whose path contains `default_path` becomes the default one.
    pub fn add_calendar(&mut self, calendar: CalendarCollection, default_path: Option<&str>) {
        if calendar.supports_polls() {
            self.poll_calendars.push(calendar.clone());
        }
        if calendar.supports_tasks() {
            self.task_calendars.push(calendar.clone());
        }
        if calendar.supports_events() {
            let is_default = default_path
                .filter(|path| !path.is_empty())
                .map(|path| calendar.url().path().contains(path))
                .unwrap_or(false);
            if is_default && self.default_event_calendar.is_none() {
                self.default_event_calendar = Some(self.event_calendars.len());
            }
            self.event_calendars.push(calendar);
        }
    }

    pub fn poll_calendars(&self) -> &[CalendarCollection] { &self.poll_calendars }
    pub fn event_calendars(&self) -> &[CalendarCollection] { &self.event_calendars }
    pub fn task_calendars(&self) -> &[CalendarCollection] { &self.task_calendars }

    pub fn default_event_calendar(&self) -> Option<&CalendarCollection> {
        self.default_event_calendar.and_then(|index| self.event_calendars.get(index))
    }

    /// The calendar new events go to: the default one, or else the first one
    pub fn event_calendar(&self) -> Option<&CalendarCollection> {
        self.default_event_calendar().or_else(|| self.event_calendars.first())
    }
}

/// Pick the preferred address: `mailto:` first, then `urn:uuid:`
pub fn best_cu_address(addresses: &[String]) -> Option<&str> {
    addresses.iter()
        .find(|addr| addr.starts_with("mailto:"))
        .or_else(|| addresses.iter().find(|addr| addr.starts_with("urn:uuid:")))
        .map(String::as_str)
}

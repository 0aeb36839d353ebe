//! Per-user context that every date computation and ownership check needs

use chrono_tz::Tz;

use crate::calendar::CalendarCollection;
use crate::principal::Principal;
use crate::temporal::FieldType;

/// The logged-in principal and their display preferences
#[derive(Clone, Debug)]
pub struct Session {
    principal: Principal,
    default_tz: Tz,
    hour24: bool,
    preferred_end_type: FieldType,
    /// Event collections whose path contains this are preferred for new events
    default_calendar_path: Option<String>,
}

impl Session {
    /// A session displaying times in 24-hour format, with explicit end dates
    pub fn new(principal: Principal, default_tz: Tz) -> Self {
        Self {
            principal,
            default_tz,
            hour24: true,
            preferred_end_type: FieldType::Date,
            default_calendar_path: None,
        }
    }

    pub fn with_hour24(mut self, hour24: bool) -> Self {
        self.hour24 = hour24;
        self
    }

    pub fn with_preferred_end_type(mut self, end_type: FieldType) -> Self {
        self.preferred_end_type = end_type;
        self
    }

    pub fn with_default_calendar_path<S: Into<String>>(mut self, path: S) -> Self {
        self.default_calendar_path = Some(path.into());
        self
    }

    /// Register one of the principal's collections, as found on the server
    pub fn add_calendar(&mut self, calendar: CalendarCollection) {
        self.principal.add_calendar(calendar, self.default_calendar_path.as_deref());
    }

    pub fn principal(&self) -> &Principal { &self.principal }
    pub fn principal_mut(&mut self) -> &mut Principal { &mut self.principal }
    pub fn default_tz(&self) -> Tz { self.default_tz }
    pub fn hour24(&self) -> bool { self.hour24 }
    pub fn preferred_end_type(&self) -> FieldType { self.preferred_end_type }
    pub fn default_calendar_path(&self) -> Option<&str> { self.default_calendar_path.as_deref() }
}

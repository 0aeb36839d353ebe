//! Start and end instants of calendar components (DTSTART, DTEND, DUE and DURATION)
//!
//! A [`TemporalValue`] remembers how it was expressed (all-day date, UTC date-time, date-time in a
//! named timezone or floating date-time) so that it is written back the same way.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PollError, Result};
use crate::jcal::{JcalComponent, JcalProperty};
use crate::session::Session;

/// How the end of a component is written
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// An explicit DTEND or DUE
    Date,
    /// A DURATION relative to the start
    Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    Utc,
    Named(Tz),
    /// No timezone: the wall time is read in whatever zone the viewer is in
    Floating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemporalValue {
    role: Role,
    /// Wall time in `zone`. All-day values are at midnight
    local: NaiveDateTime,
    zone: Zone,
    all_day: bool,
    field_type: FieldType,
    hour24: bool,
    /// The viewer's timezone, used for the `*_locale` renderings and for floating times
    locale_tz: Tz,
}

impl TemporalValue {
    fn blank(session: &Session, role: Role) -> Self {
        let field_type = match role {
            Role::Start => FieldType::Date,
            Role::End => session.preferred_end_type(),
        };
        Self {
            role,
            local: NaiveDateTime::default(),
            zone: Zone::Floating,
            all_day: false,
            field_type,
            hour24: session.hour24(),
            locale_tz: session.default_tz(),
        }
    }

    /// Build a value out of a DTSTART, DTEND or DUE property
    pub fn from_property(session: &Session, prop: &JcalProperty) -> Result<Self> {
        let role = if prop.name() == "dtstart" { Role::Start } else { Role::End };
        let text = prop.value_str().ok_or_else(|| PollError::MalformedTemporalValue {
            value: format!("{:?}", prop.value()),
            reason: format!("{} does not hold a text value", prop.name()),
        })?;
        let (date, time, utc) = parse_date_time(text)?;

        let mut value = Self::blank(session, role);
        match time {
            None => {
                value.all_day = true;
                value.local = start_of_day(date);
            },
            Some(time) => {
                value.local = date.and_time(time);
                value.zone = if utc {
                    Zone::Utc
                } else {
                    match prop.param_str("tzid") {
                        Some(tzid) => Zone::Named(resolve_tzid(tzid)?),
                        None => Zone::Floating,
                    }
                };
            },
        }
        Ok(value)
    }

    /// The current hour in the session timezone (minutes and seconds are zeroed)
    pub fn now(session: &Session, role: Role) -> Self {
        let tz = session.default_tz();
        let now = Utc::now().with_timezone(&tz).naive_local();
        let mut value = Self::blank(session, role);
        value.local = now.date().and_hms_opt(now.hour(), 0, 0).unwrap_or(now);
        value.zone = Zone::Named(tz);
        value
    }

    /// Set this value from form fields. `hours` is read in 12 or 24-hour format, depending on the session
    #[allow(clippy::too_many_arguments)]
    pub fn update(&mut self, date_part: &str, all_day: bool, utc: bool, tzid: Option<&str>, hours: u32, minutes: u32, am: bool) -> Result<()> {
        let date = parse_date(date_part).ok_or_else(|| PollError::MalformedTemporalValue {
            value: date_part.to_string(),
            reason: "expected a YYYY-MM-DD date".to_string(),
        })?;

        if all_day {
            self.local = start_of_day(date);
            self.zone = Zone::Floating;
        } else {
            let hour = self.to_hour24(hours, am)?;
            let time = NaiveTime::from_hms_opt(hour, minutes, 0).ok_or_else(|| PollError::InvalidNumericField {
                field: "minutes",
                value: minutes.to_string(),
            })?;
            let zone = if utc {
                Zone::Utc
            } else {
                match tzid.filter(|id| !id.is_empty()) {
                    Some(id) => Zone::Named(resolve_tzid(id)?),
                    None => Zone::Named(self.locale_tz),
                }
            };
            self.local = date.and_time(time);
            self.zone = zone;
        }
        self.all_day = all_day;
        self.field_type = FieldType::Date;
        Ok(())
    }

    /// Make this value `duration` after `start`, and write it as a DURATION from now on
    pub fn update_from_duration(&mut self, duration: Duration, start: &TemporalValue) -> Result<()> {
        self.all_day = start.all_day;
        self.zone = start.zone;
        self.local = start.local;
        self.add_seconds(duration.num_seconds())?;
        self.field_type = FieldType::Duration;
        Ok(())
    }

    /// Convert a form hour to 24-hour format. In 24-hour mode the value is returned unchanged.
    pub fn to_hour24(&self, hours: u32, am: bool) -> Result<u32> {
        let invalid = || PollError::InvalidNumericField { field: "hours", value: hours.to_string() };
        if self.hour24 {
            return if hours < 24 { Ok(hours) } else { Err(invalid()) };
        }
        match (hours, am) {
            (0, _) | (13..=u32::MAX, _) => Err(invalid()),
            (12, true) => Ok(0),
            (h, true) => Ok(h),
            (12, false) => Ok(12),
            (h, false) => Ok(h + 12),
        }
    }

    pub fn role(&self) -> Role { self.role }
    pub fn zone(&self) -> Zone { self.zone }
    pub fn all_day(&self) -> bool { self.all_day }
    pub fn is_utc(&self) -> bool { self.zone == Zone::Utc }
    pub fn hour24(&self) -> bool { self.hour24 }
    pub fn field_type(&self) -> FieldType { self.field_type }
    pub fn set_field_type(&mut self, field_type: FieldType) { self.field_type = field_type; }
    pub fn date(&self) -> NaiveDate { self.local.date() }

    /// The hour in 24-hour format
    pub fn hours24(&self) -> u32 { self.local.hour() }

    /// The hour in the session's preferred format
    pub fn hours(&self) -> u32 {
        if self.hour24 {
            return self.local.hour();
        }
        match self.local.hour() % 12 {
            0 => 12,
            h => h,
        }
    }

    pub fn minutes(&self) -> u32 { self.local.minute() }
    pub fn am(&self) -> bool { self.local.hour() < 12 }

    /// The TZID parameter to write, if any. UTC and all-day values have none
    pub fn tzid(&self) -> Option<&'static str> {
        match self.zone {
            Zone::Named(tz) if !self.all_day => Some(tz.name()),
            _ => None,
        }
    }

    /// The timezone this value is displayed in
    pub fn display_tzid(&self) -> &'static str {
        match self.zone {
            Zone::Utc => "UTC",
            Zone::Named(tz) => tz.name(),
            Zone::Floating => self.locale_tz.name(),
        }
    }

    /// A copy playing another role (e.g. an end computed from a start)
    pub fn duplicate_as(&self, role: Role) -> Self {
        let mut copy = self.clone();
        copy.role = role;
        copy.field_type = FieldType::Date;
        copy
    }

    pub fn instant(&self) -> DateTime<Utc> {
        match self.zone {
            Zone::Utc => Utc.from_utc_datetime(&self.local),
            Zone::Named(tz) => resolve_local(tz, &self.local).with_timezone(&Utc),
            Zone::Floating => resolve_local(self.locale_tz, &self.local).with_timezone(&Utc),
        }
    }

    fn set_instant(&mut self, instant: DateTime<Utc>) {
        self.local = match self.zone {
            Zone::Utc => instant.naive_utc(),
            Zone::Named(tz) => instant.with_timezone(&tz).naive_local(),
            Zone::Floating => instant.with_timezone(&self.locale_tz).naive_local(),
        };
    }

    pub fn epoch_millis(&self) -> i64 {
        self.instant().timestamp_millis()
    }

    fn out_of_range(&self, seconds: i64) -> PollError {
        PollError::MalformedTemporalValue {
            value: format!("{} {:+}s", self.local, seconds),
            reason: "the result is out of range".to_string(),
        }
    }

    /// Add elapsed seconds. All-day values move by calendar days and stay at midnight
    pub fn add_seconds(&mut self, seconds: i64) -> Result<()> {
        let delta = checked_seconds(seconds).ok_or_else(|| self.out_of_range(seconds))?;
        if self.all_day {
            self.local = self.local.checked_add_signed(delta).ok_or_else(|| self.out_of_range(seconds))?;
        } else {
            let instant = self.instant().checked_add_signed(delta).ok_or_else(|| self.out_of_range(seconds))?;
            self.set_instant(instant);
        }
        Ok(())
    }

    pub fn add_hours(&mut self, hours: i64) -> Result<()> {
        let seconds = hours.checked_mul(3600).ok_or_else(|| self.out_of_range(i64::MAX))?;
        self.add_seconds(seconds)
    }

    pub fn subtract_hours(&mut self, hours: i64) -> Result<()> {
        let seconds = hours.checked_mul(-3600).ok_or_else(|| self.out_of_range(i64::MIN))?;
        self.add_seconds(seconds)
    }

    /// Add calendar days, keeping the wall time
    pub fn add_days(&mut self, days: i64) -> Result<()> {
        let seconds = days.checked_mul(86_400).ok_or_else(|| self.out_of_range(i64::MAX))?;
        let delta = checked_seconds(seconds).ok_or_else(|| self.out_of_range(seconds))?;
        self.local = self.local.checked_add_signed(delta).ok_or_else(|| self.out_of_range(seconds))?;
        Ok(())
    }

    /// `self - other`, truncated to whole `unit`s
    pub fn diff(&self, other: &TemporalValue, unit: TimeUnit) -> i64 {
        let delta = if self.all_day && other.all_day {
            self.local - other.local
        } else {
            self.instant() - other.instant()
        };
        match unit {
            TimeUnit::Seconds => delta.num_seconds(),
            TimeUnit::Minutes => delta.num_minutes(),
            TimeUnit::Hours => delta.num_hours(),
            TimeUnit::Days => delta.num_days(),
            TimeUnit::Weeks => delta.num_weeks(),
        }
    }

    pub fn same_instant(&self, other: &TemporalValue) -> bool {
        self.instant() == other.instant()
    }

    /// Whether both values fall on the same calendar date (time ignored)
    pub fn date_equals(&self, other: &TemporalValue) -> bool {
        self.date() == other.date()
    }

    /// `YYYY-MM-DD`
    pub fn get_date_part(&self) -> String {
        self.local.format("%Y-%m-%d").to_string()
    }

    /// iCalendar text form: `YYYYMMDD` for all-day values, else a UTC `YYYYMMDDTHHMMSSZ`
    pub fn get_ical_utc(&self) -> String {
        if self.all_day {
            self.local.format("%Y%m%d").to_string()
        } else {
            self.instant().format("%Y%m%dT%H%M%SZ").to_string()
        }
    }

    /// jCal value: `YYYY-MM-DD` for all-day values, else `YYYY-MM-DDTHH:MM:00`, with a trailing `Z` for UTC
    pub fn get_dtval(&self) -> String {
        if self.all_day {
            return self.get_date_part();
        }
        let suffix = if self.is_utc() { "Z" } else { "" };
        format!("{}{}", self.local.format("%Y-%m-%dT%H:%M:00"), suffix)
    }

    pub fn printable_time(&self) -> String {
        format_time(self.hour24, &self.local)
    }

    pub fn printable_date(&self) -> String {
        format_date(self.local.date())
    }

    fn shares_locale_zone(&self) -> bool {
        self.all_day || match self.zone {
            Zone::Named(tz) => tz == self.locale_tz,
            Zone::Floating => true,
            Zone::Utc => self.locale_tz == Tz::UTC,
        }
    }

    /// Wall time of this instant in the viewer's timezone
    pub fn locale_local(&self) -> NaiveDateTime {
        if self.shares_locale_zone() {
            return self.local;
        }
        self.instant().with_timezone(&self.locale_tz).naive_local()
    }

    pub fn printable_time_locale(&self) -> String {
        if self.shares_locale_zone() {
            return self.printable_time();
        }
        format_time(self.hour24, &self.locale_local())
    }

    pub fn printable_date_locale(&self) -> String {
        if self.shares_locale_zone() {
            return self.printable_date();
        }
        format_date(self.locale_local().date())
    }

    fn property_name(&self, comp: &JcalComponent) -> &'static str {
        match self.role {
            Role::Start => "dtstart",
            Role::End if comp.is_event() => "dtend",
            Role::End => "due",
        }
    }

    /// Write this value into `comp`.
    ///
    /// An end in duration mode writes DURATION (relative to `start`, which is then required) and drops
    /// DTEND/DUE. Otherwise DTSTART, DTEND or DUE is written, and an end drops any DURATION.
    pub fn update_property(&self, comp: &mut JcalComponent, start: Option<&TemporalValue>) -> Result<()> {
        let name = self.property_name(comp);

        if self.role == Role::End && self.field_type == FieldType::Duration {
            let start = start.ok_or_else(|| PollError::structure("a duration can only be written relative to a start"))?;
            let seconds = self.diff(start, TimeUnit::Seconds);
            comp.update_property("duration", format_duration(seconds), Map::new(), "duration");
            comp.remove_properties(name);
            return Ok(());
        }

        let mut params = Map::new();
        if let Some(tzid) = self.tzid() {
            params.insert("tzid".to_string(), Value::String(tzid.to_string()));
        }
        let value_type = if self.all_day { "date" } else { "date-time" };
        comp.update_property(name, self.get_dtval(), params, value_type);
        if self.role == Role::End {
            comp.remove_properties("duration");
        }
        Ok(())
    }
}

/// Look a timezone identifier up in the IANA database.
/// Some clients prefix identifiers (e.g. `/mozilla.org/20050126_1/Europe/Paris`), these are stripped.
pub fn resolve_tzid(tzid: &str) -> Result<Tz> {
    let trimmed = tzid.trim();
    if let Ok(tz) = trimmed.parse::<Tz>() {
        return Ok(tz);
    }

    // Try every suffix starting at a slash, longest first
    let mut rest = trimmed;
    while let Some(pos) = rest.find('/') {
        rest = &rest[pos + 1..];
        if let Ok(tz) = rest.parse::<Tz>() {
            return Ok(tz);
        }
    }
    Err(PollError::UnknownTimezone(tzid.to_string()))
}

fn resolve_local(tz: Tz, local: &NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // A wall time skipped by a DST transition
        LocalResult::None => tz
            .from_local_datetime(&(*local + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(local)),
    }
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn two_digits(text: &str) -> Option<u32> {
    if text.len() == 2 && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// `YYYY-MM-DD` or `YYYYMMDD`
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if !text.is_ascii() {
        return None;
    }
    let (year, month, day) = match text.len() {
        10 if &text[4..5] == "-" && &text[7..8] == "-" => (&text[0..4], &text[5..7], &text[8..10]),
        8 => (&text[0..4], &text[4..6], &text[6..8]),
        _ => return None,
    };
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, two_digits(month)?, two_digits(day)?)
}

/// Split a jCal or iCalendar date / date-time. Returns the date, the time (`None` for a date) and whether it is UTC
fn parse_date_time(text: &str) -> Result<(NaiveDate, Option<NaiveTime>, bool)> {
    let malformed = |reason: &str| PollError::MalformedTemporalValue {
        value: text.to_string(),
        reason: reason.to_string(),
    };

    let text = text.trim();
    let (date_text, time_text) = match text.find('T') {
        Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
        None => (text, None),
    };
    let date = parse_date(date_text).ok_or_else(|| malformed("invalid date"))?;

    let time_text = match time_text {
        None => return Ok((date, None, false)),
        Some(time_text) => time_text,
    };
    let (time_text, utc) = match time_text.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (time_text, false),
    };
    let digits: String = time_text.chars().filter(|c| *c != ':').collect();
    if !digits.is_ascii() {
        return Err(malformed("invalid time"));
    }
    let (hours, minutes, seconds) = match digits.len() {
        4 => (two_digits(&digits[0..2]), two_digits(&digits[2..4]), Some(0)),
        6 => (two_digits(&digits[0..2]), two_digits(&digits[2..4]), two_digits(&digits[4..6])),
        _ => return Err(malformed("invalid time")),
    };
    let time = match (hours, minutes, seconds) {
        (Some(h), Some(m), Some(s)) => NaiveTime::from_hms_opt(h, m, s),
        _ => None,
    };
    let time = time.ok_or_else(|| malformed("invalid time"))?;
    Ok((date, Some(time), utc))
}

/// Format seconds as an iCalendar duration, e.g. `PT1H30M`, `P1D` or `-P2W`
pub fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let mut rest = seconds.abs();
    let days = rest / 86_400;
    rest %= 86_400;
    let (hours, minutes, secs) = (rest / 3600, (rest % 3600) / 60, rest % 60);

    if rest == 0 && days > 0 && days % 7 == 0 {
        return format!("{}P{}W", sign, days / 7);
    }
    let mut out = format!("{}P", sign);
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if rest > 0 || days == 0 {
        out.push('T');
        if hours > 0 { out.push_str(&format!("{}H", hours)); }
        if minutes > 0 { out.push_str(&format!("{}M", minutes)); }
        if secs > 0 || rest == 0 { out.push_str(&format!("{}S", secs)); }
    }
    out
}

/// Parse an iCalendar duration such as `PT1H`, `P1DT12H` or `-P1W`
pub fn parse_duration(text: &str) -> Result<Duration> {
    let malformed = || PollError::MalformedTemporalValue {
        value: text.to_string(),
        reason: "invalid duration".to_string(),
    };

    let trimmed = text.trim();
    let (negative, rest) = match trimmed.chars().next() {
        Some('-') => (true, &trimmed[1..]),
        Some('+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let rest = rest.strip_prefix('P').ok_or_else(malformed)?;
    if rest.is_empty() {
        return Err(malformed());
    }

    let mut seconds: i64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        if c == 'T' {
            if in_time || !number.is_empty() {
                return Err(malformed());
            }
            in_time = true;
            continue;
        }
        let amount: i64 = number.parse().map_err(|_| malformed())?;
        number.clear();
        let unit = match (c, in_time) {
            ('W', false) => 7 * 86_400,
            ('D', false) => 86_400,
            ('H', true) => 3600,
            ('M', true) => 60,
            ('S', true) => 1,
            _ => return Err(malformed()),
        };
        seconds = amount.checked_mul(unit)
            .and_then(|part| seconds.checked_add(part))
            .ok_or_else(malformed)?;
    }
    if !number.is_empty() {
        return Err(malformed());
    }

    checked_seconds(if negative { -seconds } else { seconds }).ok_or_else(malformed)
}

/// `Duration::seconds` without its panic on values chrono cannot hold
fn checked_seconds(seconds: i64) -> Option<Duration> {
    seconds.checked_mul(1000)
        .filter(|millis| *millis != i64::MIN)
        .map(Duration::milliseconds)
}

/// Parse a form field that must hold an integer
pub fn parse_numeric_field(field: &'static str, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| PollError::InvalidNumericField {
        field,
        value: value.to_string(),
    })
}

/// Zero-pad an hour or minute form field to two digits
pub fn pad_time_unit(field: &'static str, value: &str) -> Result<String> {
    let number = parse_numeric_field(field, value)?;
    if !(0..60).contains(&number) {
        return Err(PollError::InvalidNumericField { field, value: value.to_string() });
    }
    Ok(format!("{:02}", number))
}

/// Read an hour form field into 24-hour format. `meridiem` is `None` for 24-hour forms
pub fn hour_from_form(value: &str, meridiem: Option<Meridiem>) -> Result<u32> {
    let invalid = || PollError::InvalidNumericField { field: "hours", value: value.to_string() };
    let hour = parse_numeric_field("hours", value)?;
    let hour = match meridiem {
        None if (0..24).contains(&hour) => hour,
        Some(_) if !(1..=12).contains(&hour) => return Err(invalid()),
        Some(Meridiem::Am) if hour == 12 => 0,
        Some(Meridiem::Pm) if hour < 12 => hour + 12,
        Some(_) => hour,
        None => return Err(invalid()),
    };
    u32::try_from(hour).map_err(|_| invalid())
}

fn format_time(hour24: bool, local: &NaiveDateTime) -> String {
    if hour24 {
        local.format("%H:%M").to_string()
    } else {
        local.format("%-I:%M %P").to_string()
    }
}

/// e.g. `Th, Jul 4, 2024`
fn format_date(date: NaiveDate) -> String {
    let day = match date.weekday() {
        Weekday::Mon => "Mo",
        Weekday::Tue => "Tu",
        Weekday::Wed => "We",
        Weekday::Thu => "Th",
        Weekday::Fri => "Fr",
        Weekday::Sat => "Sa",
        Weekday::Sun => "Su",
    };
    format!("{}, {}", day, date.format("%b %-d, %Y"))
}

//! Recurrence rules (RRULE) in their jCal form, and their English description

use chrono::Weekday;
use serde_json::{Map, Value};

use crate::component::{CalendarObject, ComponentId};
use crate::error::{PollError, Result};
use crate::temporal::{parse_date, parse_numeric_field};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "HOURLY" => Some(Frequency::Hourly),
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Frequency::Hourly => "hour",
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        }
    }
}

/// A BYDAY entry such as `MO`, `2TU` or `-1FR`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeekdayNum {
    pub position: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() < 2 || !text.is_ascii() {
            return None;
        }
        let (position, day) = text.split_at(text.len() - 2);
        let weekday = weekday_from_code(day)?;
        let position = match position {
            "" => None,
            pos => Some(pos.trim_start_matches('+').parse().ok()?),
        };
        Some(Self { position, weekday })
    }

    pub fn to_code(self) -> String {
        match self.position {
            None => weekday_code(self.weekday).to_string(),
            Some(pos) => format!("{}{}", pos, weekday_code(self.weekday)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecurrenceEnd {
    Forever,
    Count(u32),
    /// The UNTIL value, as written (e.g. `20240801T000000`)
    Until(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub end: RecurrenceEnd,
    pub by_day: Vec<WeekdayNum>,
    pub by_month: Vec<u8>,
    pub by_month_day: Vec<i8>,
    pub by_year_day: Vec<i16>,
    pub by_week_no: Vec<i8>,
    pub wkst: Option<Weekday>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            end: RecurrenceEnd::Forever,
            by_day: Vec::new(),
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            wkst: None,
        }
    }

    /// The jCal `recur` value. An interval of 1 is not written
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("freq".to_string(), Value::from(self.freq.name()));
        match &self.end {
            RecurrenceEnd::Forever => {},
            RecurrenceEnd::Count(count) => { map.insert("count".to_string(), Value::from(*count)); },
            RecurrenceEnd::Until(until) => { map.insert("until".to_string(), Value::from(until.as_str())); },
        }
        if self.interval != 1 {
            map.insert("interval".to_string(), Value::from(self.interval));
        }
        match self.by_day.as_slice() {
            [] => {},
            [single] => { map.insert("byday".to_string(), Value::from(single.to_code())); },
            many => { map.insert("byday".to_string(), many.iter().map(|day| Value::from(day.to_code())).collect()); },
        }
        insert_numbers(&mut map, "bymonth", &self.by_month);
        insert_numbers(&mut map, "bymonthday", &self.by_month_day);
        insert_numbers(&mut map, "byyearday", &self.by_year_day);
        insert_numbers(&mut map, "byweekno", &self.by_week_no);
        if let Some(wkst) = self.wkst {
            map.insert("wkst".to_string(), Value::from(weekday_code(wkst)));
        }
        Value::Object(map)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let invalid = |reason: &str| PollError::Serialization(format!("invalid recurrence rule {}: {}", value, reason));
        let map = value.as_object().ok_or_else(|| invalid("not an object"))?;

        let freq = map.get("freq")
            .and_then(Value::as_str)
            .and_then(Frequency::from_name)
            .ok_or_else(|| invalid("missing or unsupported FREQ"))?;
        let mut rule = Self::new(freq);

        if let Some(interval) = map.get("interval") {
            rule.interval = as_integer(interval).and_then(|i| u32::try_from(i).ok()).ok_or_else(|| invalid("bad INTERVAL"))?;
        }
        if let Some(until) = map.get("until") {
            rule.end = RecurrenceEnd::Until(until.as_str().ok_or_else(|| invalid("bad UNTIL"))?.to_string());
        } else if let Some(count) = map.get("count") {
            rule.end = RecurrenceEnd::Count(as_integer(count).and_then(|c| u32::try_from(c).ok()).ok_or_else(|| invalid("bad COUNT"))?);
        }
        if let Some(by_day) = map.get("byday") {
            rule.by_day = as_array(by_day).into_iter()
                .map(|day| day.as_str().and_then(WeekdayNum::parse))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("bad BYDAY"))?;
        }
        rule.by_month = numbers(map, "bymonth").ok_or_else(|| invalid("bad BYMONTH"))?;
        rule.by_month_day = numbers(map, "bymonthday").ok_or_else(|| invalid("bad BYMONTHDAY"))?;
        rule.by_year_day = numbers(map, "byyearday").ok_or_else(|| invalid("bad BYYEARDAY"))?;
        rule.by_week_no = numbers(map, "byweekno").ok_or_else(|| invalid("bad BYWEEKNO"))?;
        if let Some(wkst) = map.get("wkst") {
            rule.wkst = Some(wkst.as_str().and_then(weekday_from_code).ok_or_else(|| invalid("bad WKST"))?);
        }
        Ok(rule)
    }

    /// e.g. `Every 2 weeks on the first Monday and the last Friday, repeating 5 times`
    pub fn describe(&self) -> String {
        let mut text = String::from("Every");
        if self.interval != 1 {
            text.push_str(&format!(" {} {}s", self.interval, self.freq.unit()));
        } else {
            text.push_str(&format!(" {}", self.freq.unit()));
        }

        for (i, day) in self.by_day.iter().enumerate() {
            text.push_str(if i == 0 { " on " } else { " and " });
            if let Some(position) = day.position.and_then(position_label) {
                text.push_str(position);
                text.push(' ');
            }
            text.push_str(weekday_name(day.weekday));
        }

        if !self.by_month.is_empty() {
            let months: Vec<&str> = self.by_month.iter().filter_map(|m| month_name(*m)).collect();
            text.push_str(&format!(" in {}", months.join(" and ")));
        }
        for day in &self.by_month_day {
            text.push_str(&ordinal_phrase(i64::from(*day), "day of the month"));
        }
        for day in &self.by_year_day {
            text.push_str(&ordinal_phrase(i64::from(*day), "day of the year"));
        }
        for week in &self.by_week_no {
            text.push_str(&ordinal_phrase(i64::from(*week), "week of the year"));
        }

        match &self.end {
            RecurrenceEnd::Until(until) => text.push_str(&format!(", repeating until {}", until)),
            RecurrenceEnd::Count(1) => text.push_str(", repeating 1 time"),
            RecurrenceEnd::Count(count) => text.push_str(&format!(", repeating {} times", count)),
            RecurrenceEnd::Forever => text.push_str(", repeating forever"),
        }
        text
    }
}

/// Describe how a component recurs. Instances (with a RECURRENCE-ID) and non-recurring components
/// have no description. Only the first RRULE is described.
pub fn describe_component(object: &CalendarObject, id: ComponentId) -> Option<String> {
    if object.property(id, "recurrence-id").is_some() {
        return None;
    }
    let rule = object.rrules(id).into_iter().next()?;
    match RecurrenceRule::from_value(rule) {
        Ok(rule) => Some(rule.describe()),
        Err(err) => {
            log::warn!("Unable to describe recurrence: {}", err);
            None
        },
    }
}

/// Recurrence settings as entered in a form. Every field is text, as typed
#[derive(Clone, Debug, Default)]
pub struct RecurrenceForm {
    /// `NONE`, `HOURLY`, `DAILY`...
    pub freq: String,
    pub interval: String,
    pub end: RecurrenceFormEnd,
    /// `(position, day codes)` rows. A position of `0` means "every"
    pub by_day: Vec<(String, Vec<String>)>,
    pub by_month: Vec<String>,
    pub by_month_day: Vec<String>,
    pub by_year_day: Vec<String>,
    pub by_week_no: Vec<String>,
    pub wkst: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecurrenceFormEnd {
    Forever,
    Count(String),
    /// A `YYYY-MM-DD` or `YYYYMMDD` date
    Until(String),
}

impl Default for RecurrenceFormEnd {
    fn default() -> Self { RecurrenceFormEnd::Forever }
}

impl RecurrenceForm {
    /// Build the rule. `Ok(None)` means the component does not recur.
    /// Only the BY* parts that make sense for the frequency are kept.
    pub fn assemble(&self) -> Result<Option<RecurrenceRule>> {
        if self.freq.trim().is_empty() || self.freq.trim().eq_ignore_ascii_case("NONE") {
            return Ok(None);
        }
        let freq = Frequency::from_name(self.freq.trim()).ok_or_else(|| PollError::Serialization(format!("unsupported frequency {:?}", self.freq)))?;
        let mut rule = RecurrenceRule::new(freq);

        if !self.interval.trim().is_empty() {
            rule.interval = positive("interval", &self.interval)?;
        }
        rule.end = match &self.end {
            RecurrenceFormEnd::Forever => RecurrenceEnd::Forever,
            RecurrenceFormEnd::Count(count) => RecurrenceEnd::Count(positive("count", count)?),
            RecurrenceFormEnd::Until(date) => {
                let date = parse_date(date).ok_or_else(|| PollError::MalformedTemporalValue {
                    value: date.clone(),
                    reason: "expected a YYYY-MM-DD date".to_string(),
                })?;
                RecurrenceEnd::Until(format!("{}T000000", date.format("%Y%m%d")))
            },
        };

        let keeps_by_day = matches!(freq, Frequency::Weekly | Frequency::Monthly | Frequency::Yearly);
        let keeps_by_month = matches!(freq, Frequency::Daily | Frequency::Yearly);
        let keeps_by_month_day = matches!(freq, Frequency::Monthly | Frequency::Yearly);
        let keeps_year_parts = freq == Frequency::Yearly;
        let keeps_wkst = matches!(freq, Frequency::Weekly | Frequency::Yearly);

        if keeps_by_day {
            for (position, days) in &self.by_day {
                let position = parse_numeric_field("byday position", position)?;
                let position = match position {
                    0 => None,
                    pos => Some(i8::try_from(pos).map_err(|_| PollError::InvalidNumericField { field: "byday position", value: pos.to_string() })?),
                };
                for day in days {
                    let weekday = weekday_from_code(day).ok_or_else(|| PollError::InvalidNumericField { field: "byday", value: day.clone() })?;
                    rule.by_day.push(WeekdayNum { position, weekday });
                }
            }
        }
        if keeps_by_month {
            rule.by_month = form_numbers("bymonth", &self.by_month)?;
        }
        if keeps_by_month_day {
            rule.by_month_day = form_numbers("bymonthday", &self.by_month_day)?;
        }
        if keeps_year_parts {
            rule.by_year_day = form_numbers("byyearday", &self.by_year_day)?;
            rule.by_week_no = form_numbers("byweekno", &self.by_week_no)?;
        }
        if keeps_wkst {
            if let Some(wkst) = &self.wkst {
                rule.wkst = Some(weekday_from_code(wkst).ok_or_else(|| PollError::InvalidNumericField { field: "wkst", value: wkst.clone() })?);
            }
        }
        Ok(Some(rule))
    }
}

/// A jCal value that may be a single item or an array of items
pub fn as_array(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn numbers<T: TryFrom<i64>>(map: &Map<String, Value>, key: &str) -> Option<Vec<T>> {
    match map.get(key) {
        None => Some(Vec::new()),
        Some(value) => as_array(value).into_iter()
            .map(|item| as_integer(item).and_then(|i| T::try_from(i).ok()))
            .collect(),
    }
}

fn insert_numbers<T: Copy + Into<i64>>(map: &mut Map<String, Value>, key: &str, values: &[T]) {
    match values {
        [] => {},
        [single] => { map.insert(key.to_string(), Value::from((*single).into())); },
        many => { map.insert(key.to_string(), many.iter().map(|v| Value::from((*v).into())).collect()); },
    }
}

fn positive(field: &'static str, text: &str) -> Result<u32> {
    let number = parse_numeric_field(field, text)?;
    u32::try_from(number)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| PollError::InvalidNumericField { field, value: text.to_string() })
}

fn form_numbers<T: TryFrom<i64>>(field: &'static str, texts: &[String]) -> Result<Vec<T>> {
    texts.iter()
        .map(|text| {
            let number = parse_numeric_field(field, text)?;
            T::try_from(number).map_err(|_| PollError::InvalidNumericField { field, value: text.clone() })
        })
        .collect()
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn weekday_from_code(code: &str) -> Option<Weekday> {
    match code.trim().to_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn month_name(month: u8) -> Option<&'static str> {
    const MONTHS: [&str; 12] = [
        "January", "February", "March", "April", "May", "June",
        "July", "August", "September", "October", "November", "December",
    ];
    MONTHS.get(usize::from(month).checked_sub(1)?).copied()
}

fn position_label(position: i8) -> Option<&'static str> {
    match position {
        1 => Some("the first"),
        2 => Some("the second"),
        3 => Some("the third"),
        4 => Some("the fourth"),
        5 => Some("the fifth"),
        -1 => Some("the last"),
        _ => None,
    }
}

fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// ` on the 3rd day of the month`, or ` on the 3rd day of the month from the end` for negative values
fn ordinal_phrase(n: i64, what: &str) -> String {
    if n < 0 {
        format!(" on the {} {} from the end", ordinal(-n), what)
    } else {
        format!(" on the {} {}", ordinal(n), what)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::sample_poll;
    use serde_json::json;

    #[test]
    fn reading_rules() {
        let rule = RecurrenceRule::from_value(&json!({"freq": "WEEKLY", "interval": 2, "byday": ["1MO", "-1FR"], "count": 5})).unwrap();
        assert_eq!(rule.freq, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.end, RecurrenceEnd::Count(5));
        assert_eq!(rule.by_day[1], WeekdayNum { position: Some(-1), weekday: Weekday::Fri });
        assert_eq!(rule.describe(), "Every 2 weeks on the first Monday and the last Friday, repeating 5 times");

        let rule = RecurrenceRule::from_value(&json!({"freq": "YEARLY", "bymonth": 3, "byyearday": -10, "until": "20300101T000000"})).unwrap();
        assert_eq!(rule.by_month, vec![3]);
        assert_eq!(rule.describe(), "Every year in March on the 10th day of the year from the end, repeating until 20300101T000000");

        assert!(RecurrenceRule::from_value(&json!({"interval": 2})).is_err());
        assert!(RecurrenceRule::from_value(&json!({"freq": "DAILY", "byday": ["XX"]})).is_err());
    }

    #[test]
    fn writing_rules() {
        let mut rule = RecurrenceRule::new(Frequency::Monthly);
        rule.by_month_day = vec![1, 15];
        assert_eq!(rule.to_value(), json!({"freq": "MONTHLY", "bymonthday": [1, 15]}));
        assert_eq!(rule.describe(), "Every month on the 1st day of the month on the 15th day of the month, repeating forever");
    }

    #[test]
    fn assembling_forms() {
        let form = RecurrenceForm {
            freq: "WEEKLY".to_string(),
            interval: "1".to_string(),
            end: RecurrenceFormEnd::Until("2024-08-01".to_string()),
            by_day: vec![("0".to_string(), vec!["MO".to_string(), "WE".to_string()])],
            by_month: vec!["4".to_string()],
            ..RecurrenceForm::default()
        };
        let rule = form.assemble().unwrap().unwrap();
        assert_eq!(rule.to_value(), json!({"freq": "WEEKLY", "until": "20240801T000000", "byday": ["MO", "WE"]}));

        let none = RecurrenceForm { freq: "NONE".to_string(), ..RecurrenceForm::default() };
        assert!(none.assemble().unwrap().is_none());

        let bad = RecurrenceForm { freq: "DAILY".to_string(), interval: "often".to_string(), ..RecurrenceForm::default() };
        assert_eq!(bad.assemble().unwrap_err().kind(), crate::error::ErrorKind::InvalidNumericField);
    }

    #[test]
    fn describing_components() {
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        let choice = object.choices(poll)[0];
        assert_eq!(describe_component(&object, choice), None);

        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.end = RecurrenceEnd::Count(3);
        assert!(object.set_rrule(choice, Some(&rule)).unwrap());
        assert!(!object.set_rrule(choice, Some(&rule)).unwrap());
        assert_eq!(describe_component(&object, choice).as_deref(), Some("Every day, repeating 3 times"));
        assert!(object.set_rrule(choice, None).unwrap());
        assert!(object.rrules(choice).is_empty());
    }
}

//! Free/busy lookups, used to show whether voters are available for a choice

use serde_json::{Map, Value};

use crate::error::{PollError, Result};
use crate::jcal::{new_calendar, JcalComponent};
use crate::session::Session;
use crate::temporal::TemporalValue;
use crate::traits::SchedulingService;

/// A VFREEBUSY REQUEST asking whether `cuaddr` is busy between `start` and `end`
pub fn request(session: &Session, cuaddr: &str, start: &TemporalValue, end: &TemporalValue) -> Result<JcalComponent> {
    let principal = session.principal();
    let organizer = principal.default_address()
        .ok_or_else(|| PollError::structure("the current principal has no calendar user address"))?;
    let mut organizer_params = Map::new();
    if let Some(cn) = principal.cn() {
        organizer_params.insert("cn".to_string(), Value::from(cn));
    }

    let mut calendar = new_calendar();
    calendar.update_property("method", "REQUEST", Map::new(), "text");
    let freebusy = calendar.new_component("vfreebusy", true);
    freebusy.update_property("organizer", organizer, organizer_params, "cal-address");
    freebusy.new_property("attendee", cuaddr, Map::new(), "cal-address");
    freebusy.update_property("dtstart", utc_date_time(start), Map::new(), "date-time");
    freebusy.update_property("dtend", utc_date_time(end), Map::new(), "date-time");
    Ok(calendar)
}

/// jCal form of a UTC date-time. All-day values start at midnight UTC
fn utc_date_time(value: &TemporalValue) -> String {
    if value.all_day() {
        format!("{}T00:00:00Z", value.get_date_part())
    } else {
        value.instant().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Whether a free/busy reply reports any busy period
pub fn is_busy(reply: &JcalComponent) -> bool {
    let freebusy = match reply.name() {
        "vfreebusy" => Some(reply),
        _ => reply.main_component(),
    };
    freebusy.map(|fb| fb.has_property("freebusy")).unwrap_or(false)
}

/// Ask the scheduling service whether `cuaddr` is busy between `start` and `end`
pub async fn check_busy<S>(service: &S, session: &Session, cuaddr: &str, start: &TemporalValue, end: &TemporalValue) -> Result<bool>
where
    S: SchedulingService + Sync + ?Sized,
{
    let request = request(session, cuaddr, start, end)?;
    let reply = service.free_busy(&request).await?;
    let busy = is_busy(&reply);
    log::debug!("{} is {} from {} to {}", cuaddr, if busy { "busy" } else { "free" }, start.get_ical_utc(), end.get_ical_utc());
    Ok(busy)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::jane;
    use crate::jcal::JcalProperty;
    use crate::temporal::Role;
    use serde_json::json;

    #[test]
    fn requests() {
        let session = jane();
        let start_prop: JcalProperty = serde_json::from_value(json!(["dtstart", {"tzid": "Europe/Paris"}, "date-time", "2024-07-04T14:00:00"])).unwrap();
        let start = TemporalValue::from_property(&session, &start_prop).unwrap();
        let mut end = start.duplicate_as(Role::End);
        end.add_hours(1).unwrap();

        let request = request(&session, "mailto:joe@example.com", &start, &end).unwrap();
        assert_eq!(request.get_property_text("method"), Some("REQUEST"));
        let fb = request.main_component().unwrap();
        assert_eq!(fb.name(), "vfreebusy");
        assert_eq!(fb.get_property_text("organizer"), Some("mailto:jane@example.com"));
        assert_eq!(fb.get_property_text("attendee"), Some("mailto:joe@example.com"));
        assert_eq!(fb.get_property_text("dtstart"), Some("2024-07-04T12:00:00Z"));
        assert_eq!(fb.get_property_text("dtend"), Some("2024-07-04T13:00:00Z"));
    }

    #[test]
    fn replies() {
        let free: JcalComponent = serde_json::from_value(json!(["vcalendar", [], [["vfreebusy", [["dtstart", {}, "date-time", "2024-07-04T12:00:00Z"]], []]]])).unwrap();
        assert!(!is_busy(&free));
        let busy: JcalComponent = serde_json::from_value(json!(["vcalendar", [], [["vfreebusy", [["freebusy", {"fbtype": "BUSY"}, "period", "2024-07-04T12:00:00Z/PT1H"]], []]]])).unwrap();
        assert!(is_busy(&busy));
    }
}

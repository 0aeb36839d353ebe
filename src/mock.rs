//! In-memory collaborators, whose failures can be scripted so that tests can exercise error paths

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Offset, TimeZone};
use url::Url;

use crate::component::CalendarObject;
use crate::error::{PollError, Result};
use crate::jcal::JcalComponent;
use crate::resource::{StoredResource, VersionTag};
use crate::temporal::{resolve_tzid, TemporalValue};
use crate::traits::{ResourceStore, SchedulingService, UserSearchResult};
use crate::user::address_description;

/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    // From the ResourceStore trait
    pub fetch_behaviour: (u32, u32),
    pub create_behaviour: (u32, u32),
    pub put_behaviour: (u32, u32),
    pub delete_behaviour: (u32, u32),

    // From the SchedulingService trait
    pub user_search_behaviour: (u32, u32),
    pub free_busy_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All operations will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            fetch_behaviour: (0, n_fails),
            create_behaviour: (0, n_fails),
            put_behaviour: (0, n_fails),
            delete_behaviour: (0, n_fails),
            user_search_behaviour: (0, n_fails),
            free_busy_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_fetch(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.fetch_behaviour, "fetch")
    }
    pub fn can_create(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_behaviour, "create")
    }
    pub fn can_put(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.put_behaviour, "put")
    }
    pub fn can_delete(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_behaviour, "delete")
    }
    pub fn can_search_users(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.user_search_behaviour, "calendar_user_search")
    }
    pub fn can_get_free_busy(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.free_busy_behaviour, "free_busy")
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<()> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(PollError::transport(Some(503), format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value)))
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A server living in memory: it stores resources, knows a few users and who is busy
#[derive(Default)]
pub struct MockServer {
    behaviour: Mutex<MockBehaviour>,
    resources: Mutex<HashMap<Url, (VersionTag, JcalComponent)>>,
    /// `(cn, cuaddr, cutype)`
    directory: Vec<(String, String, String)>,
    busy: Vec<String>,
    created: Mutex<u32>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(behaviour: MockBehaviour) -> Self {
        Self { behaviour: Mutex::new(behaviour), ..Self::default() }
    }

    pub fn set_behaviour(&self, behaviour: MockBehaviour) {
        *lock(&self.behaviour) = behaviour;
    }

    pub fn add_user(&mut self, cn: &str, cuaddr: &str, cutype: &str) {
        self.directory.push((cn.to_string(), cuaddr.to_string(), cutype.to_string()));
    }

    /// `cuaddr` will be reported busy by every free/busy request
    pub fn set_busy(&mut self, cuaddr: &str) {
        self.busy.push(cuaddr.to_string());
    }

    pub fn resource(&self, url: &Url) -> Option<JcalComponent> {
        lock(&self.resources).get(url).map(|(_, data)| data.clone())
    }

    pub fn resource_count(&self) -> usize {
        lock(&self.resources).len()
    }

    fn store(&self, url: Url, data: JcalComponent) -> StoredResource {
        let etag = VersionTag::random();
        lock(&self.resources).insert(url.clone(), (etag.clone(), data.clone()));
        StoredResource { url, etag: Some(etag), data: Some(data) }
    }

    fn check_etag(&self, url: &Url, etag: Option<&VersionTag>) -> Result<()> {
        let resources = lock(&self.resources);
        match (resources.get(url), etag) {
            (Some((current, _)), Some(expected)) if current != expected => {
                Err(PollError::transport(Some(412), format!("{} has been modified by someone else", url)))
            },
            (None, Some(_)) => Err(PollError::transport(Some(412), format!("{} does not exist anymore", url))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceStore for MockServer {
    async fn fetch(&self, url: &Url) -> Result<StoredResource> {
        lock(&self.behaviour).can_fetch()?;
        let resources = lock(&self.resources);
        let (etag, data) = resources.get(url).ok_or_else(|| PollError::transport(Some(404), format!("{} not found", url)))?;
        Ok(StoredResource { url: url.clone(), etag: Some(etag.clone()), data: Some(data.clone()) })
    }

    async fn create(&self, add_member: &Url, body: &JcalComponent) -> Result<StoredResource> {
        lock(&self.behaviour).can_create()?;
        let number = {
            let mut created = lock(&self.created);
            *created += 1;
            *created
        };
        let url = add_member.join(&format!("created-{}.ics", number))?;
        Ok(self.store(url, body.clone()))
    }

    async fn put(&self, url: &Url, etag: Option<&VersionTag>, body: &JcalComponent) -> Result<StoredResource> {
        lock(&self.behaviour).can_put()?;
        self.check_etag(url, etag)?;
        Ok(self.store(url.clone(), body.clone()))
    }

    async fn delete(&self, url: &Url, etag: Option<&VersionTag>) -> Result<()> {
        lock(&self.behaviour).can_delete()?;
        self.check_etag(url, etag)?;
        match lock(&self.resources).remove(url) {
            Some(_) => Ok(()),
            None => Err(PollError::transport(Some(404), format!("{} not found", url))),
        }
    }
}

#[async_trait]
impl SchedulingService for MockServer {
    async fn calendar_user_search(&self, text: &str, cutype: &str) -> Result<Vec<UserSearchResult>> {
        lock(&self.behaviour).can_search_users()?;
        let text = text.to_lowercase();
        let mut found: Vec<UserSearchResult> = self.directory.iter()
            .filter(|(cn, cuaddr, kind)| {
                kind.eq_ignore_ascii_case(cutype) && (cn.to_lowercase().contains(&text) || cuaddr.to_lowercase().contains(&text))
            })
            .map(|(cn, cuaddr, _)| UserSearchResult { description: address_description(Some(cn), cuaddr), card: None })
            .collect();
        found.sort_by(|a, b| a.description.cmp(&b.description));
        Ok(found)
    }

    async fn free_busy(&self, request: &JcalComponent) -> Result<JcalComponent> {
        lock(&self.behaviour).can_get_free_busy()?;
        let asked = request.main_component()
            .and_then(|fb| fb.get_property_text("attendee"))
            .ok_or_else(|| PollError::transport(Some(400), "free/busy request without attendee"))?;

        let mut reply = crate::jcal::new_calendar();
        let fb = reply.new_component("vfreebusy", false);
        if let Some(request_fb) = request.main_component() {
            fb.copy_property("dtstart", request_fb);
            fb.copy_property("dtend", request_fb);
        }
        if self.busy.iter().any(|busy| busy == asked) {
            let start = fb.get_property_text("dtstart").unwrap_or_default().to_string();
            fb.new_property("freebusy", format!("{}/PT1H", start), serde_json::Map::new(), "period");
        }
        Ok(reply)
    }

    async fn timezone_offset(&self, date: NaiveDate, tzid: &str) -> Result<i32> {
        let tz = resolve_tzid(tzid)?;
        let noon = date.and_hms_opt(12, 0, 0)
            .ok_or_else(|| PollError::MalformedTemporalValue { value: date.to_string(), reason: "no noon on that day".to_string() })?;
        let offset = tz.offset_from_utc_datetime(&noon).fix().local_minus_utc();
        Ok(offset)
    }

    async fn events_for_time_range(&self, start: &TemporalValue, end: &TemporalValue) -> Result<Vec<CalendarObject>> {
        lock(&self.behaviour).can_fetch()?;
        let (from, to) = (start.get_ical_utc(), end.get_ical_utc());
        let resources = lock(&self.resources);
        let mut found = Vec::new();
        for (_, data) in resources.values() {
            let event = match data.main_component() {
                Some(event) if event.is_event() => event,
                _ => continue,
            };
            let starts = event.get_property_text("dtstart").map(|dt| dt.replace('-', "").replace(':', ""));
            if let Some(starts) = starts {
                if starts.as_str() >= from.as_str() && starts.as_str() < to.as_str() {
                    found.push(CalendarObject::from_jcal(data.clone())?);
                }
            }
        }
        Ok(found)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_behaviour() {
        let mut ok = MockBehaviour::new();
        assert!(ok.can_fetch().is_ok());
        assert!(ok.can_fetch().is_ok());
        assert!(ok.can_put().is_ok());

        let mut now = MockBehaviour::fail_now(2);
        assert!(now.can_fetch().is_err());
        assert!(now.can_put().is_err());
        assert!(now.can_put().is_err());
        assert!(now.can_fetch().is_err());
        assert!(now.can_fetch().is_ok());
        assert!(now.can_put().is_ok());

        let mut custom = MockBehaviour {
            fetch_behaviour: (0, 1),
            create_behaviour: (1, 2),
            ..MockBehaviour::default()
        };
        assert!(custom.can_fetch().is_err());
        assert!(custom.can_fetch().is_ok());
        assert!(custom.can_create().is_ok());
        assert!(custom.can_create().is_err());
        assert!(custom.can_create().is_err());
        assert!(custom.can_create().is_ok());

        custom.create_behaviour = (0, 1);
        custom.suspend();
        assert!(custom.can_create().is_ok());
        custom.resume();
        let err = custom.can_create().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TransportFailure);
    }

    #[tokio::test]
    async fn test_scheduling() {
        use crate::component::tests::jane;
        use crate::freebusy::check_busy;
        use crate::temporal::Role;

        let _ = env_logger::builder().is_test(true).try_init();
        let session = jane();
        let mut server = MockServer::new();
        server.add_user("Zoe Martin", "mailto:zoe@example.com", "INDIVIDUAL");
        server.add_user("Mark Twain", "mailto:mark@example.com", "INDIVIDUAL");
        server.add_user("Mars room", "mailto:mars@example.com", "ROOM");
        server.set_busy("mailto:zoe@example.com");

        let found = server.calendar_user_search("mar", "individual").await.unwrap();
        let found: Vec<&str> = found.iter().map(|result| result.description.as_str()).collect();
        assert_eq!(found, vec!["Mark Twain <mailto:mark@example.com>", "Zoe Martin <mailto:zoe@example.com>"]);

        let start = TemporalValue::now(&session, Role::Start);
        let mut end = start.duplicate_as(Role::End);
        end.add_hours(1).unwrap();
        assert!(check_busy(&server, &session, "mailto:zoe@example.com", &start, &end).await.unwrap());
        assert!(!check_busy(&server, &session, "mailto:mark@example.com", &start, &end).await.unwrap());

        let summer = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        assert_eq!(server.timezone_offset(summer, "Europe/Paris").await.unwrap(), 7200);
        let winter = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(server.timezone_offset(winter, "/mozilla.org/20050126_1/Europe/Paris").await.unwrap(), 3600);

        server.set_behaviour(MockBehaviour::fail_now(1));
        assert!(server.calendar_user_search("mar", "ROOM").await.is_err());
        assert_eq!(server.calendar_user_search("mar", "ROOM").await.unwrap().len(), 1);
    }
}

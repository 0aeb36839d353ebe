//! Traits used by the poll model to reach the outside world

use async_trait::async_trait;
use chrono::NaiveDate;
use url::Url;

use crate::component::{CalendarObject, CardObject};
use crate::error::Result;
use crate::jcal::JcalComponent;
use crate::resource::{StoredResource, VersionTag};
use crate::temporal::TemporalValue;

/// Where calendar resources are stored (usually a CalDAV server)
#[async_trait]
pub trait ResourceStore {
    /// Download a resource
    async fn fetch(&self, url: &Url) -> Result<StoredResource>;

    /// Create a resource by POSTing it to a collection's `add-member` URL.
    /// The store decides where the resource lives, and returns that URL
    async fn create(&self, add_member: &Url, body: &JcalComponent) -> Result<StoredResource>;

    /// Write a resource at a known URL. With an `etag`, the write only succeeds if the
    /// resource has not changed on the server since
    async fn put(&self, url: &Url, etag: Option<&VersionTag>, body: &JcalComponent) -> Result<StoredResource>;

    async fn delete(&self, url: &Url, etag: Option<&VersionTag>) -> Result<()>;
}

/// A calendar user found by a directory search
#[derive(Clone, Debug)]
pub struct UserSearchResult {
    pub description: String,
    pub card: Option<CardObject>,
}

/// Scheduling services offered by the server
#[async_trait]
pub trait SchedulingService {
    /// Look for calendar users of type `cutype` (e.g. `INDIVIDUAL`, `ROOM`) matching `text`
    async fn calendar_user_search(&self, text: &str, cutype: &str) -> Result<Vec<UserSearchResult>>;

    /// Send a VFREEBUSY request (see [`crate::freebusy::request`]) and return the reply
    async fn free_busy(&self, request: &JcalComponent) -> Result<JcalComponent>;

    /// Offset from UTC, in seconds, of timezone `tzid` on `date`
    async fn timezone_offset(&self, date: NaiveDate, tzid: &str) -> Result<i32>;

    /// The principal's events between `start` and `end`
    async fn events_for_time_range(&self, start: &TemporalValue, end: &TemporalValue) -> Result<Vec<CalendarObject>>;
}

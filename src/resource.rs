//! Calendar resources: a calendar object, and where it is stored

use serde::{Deserialize, Serialize};
use url::Url;

use crate::calendar::CalendarCollection;
use crate::component::{CalendarObject, ComponentKind};
use crate::error::{PollError, Result};
use crate::jcal::JcalComponent;
use crate::session::Session;
use crate::traits::ResourceStore;

/// A VersionTag is basically a CalDAV `etag`. Whenever it changes, this means the data has changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    tag: String
}

impl From<String> for VersionTag {
    fn from(tag: String) -> VersionTag {
        Self { tag }
    }
}

impl VersionTag {
    /// Get the inner version tag (usually a WebDAV `etag`)
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Generate a random VersionTag
    #[cfg(any(test, feature = "mock_collaborators"))]
    pub fn random() -> Self {
        let random = uuid::Uuid::new_v4().to_hyphenated().to_string();
        Self { tag: random }
    }
}

/// What a [`ResourceStore`] returns after a read or a write
#[derive(Clone, Debug)]
pub struct StoredResource {
    pub url: Url,
    pub etag: Option<VersionTag>,
    /// The data as stored on the server, when the server sent it back
    pub data: Option<JcalComponent>,
}

#[derive(Clone, Debug)]
pub struct CalendarResource {
    calendar: CalendarCollection,
    url: Option<Url>,
    etag: Option<VersionTag>,
    object: CalendarObject,
}

impl CalendarResource {
    /// Wrap a calendar object. `url` is `None` for resources that have never been saved
    pub fn new(calendar: CalendarCollection, url: Option<Url>, etag: Option<VersionTag>, object: CalendarObject) -> Self {
        Self { calendar, url, etag, object }
    }

    /// Load an existing resource of `calendar` from the store
    pub async fn fetch<S>(store: &S, calendar: CalendarCollection, url: &Url) -> Result<Self>
    where
        S: ResourceStore + Sync + ?Sized,
    {
        let stored = store.fetch(url).await?;
        let data = stored.data.ok_or_else(|| PollError::transport(None, format!("{} returned no calendar data", url)))?;
        let object = CalendarObject::from_jcal(data)?;
        Ok(Self::new(calendar, Some(stored.url), stored.etag, object))
    }

    /// A new, unsaved poll in the principal's first poll calendar
    pub fn new_poll(session: &Session, title: &str) -> Result<Self> {
        let calendar = session.principal().poll_calendars().first()
            .ok_or_else(|| PollError::structure("the current principal has no calendar that can hold polls"))?
            .clone();
        let object = CalendarObject::new_poll(session, title)?;
        Ok(Self::new(calendar, None, None, object))
    }

    /// An unsaved resource for the winner of a poll: tasks go to the first task calendar,
    /// events to the default event calendar (or the first one)
    pub fn for_winner(session: &Session, object: CalendarObject) -> Result<Self> {
        let principal = session.principal();
        let is_task = object.main_component().and_then(|id| object.kind(id)) == Some(ComponentKind::Task);
        let calendar = if is_task {
            principal.task_calendars().first()
        } else {
            principal.event_calendar()
        };
        let calendar = calendar
            .ok_or_else(|| PollError::structure("the current principal has no calendar to hold the poll winner"))?
            .clone();
        Ok(Self::new(calendar, None, None, object))
    }

    pub fn calendar(&self) -> &CalendarCollection { &self.calendar }
    pub fn url(&self) -> Option<&Url> { self.url.as_ref() }
    pub fn etag(&self) -> Option<&VersionTag> { self.etag.as_ref() }
    pub fn object(&self) -> &CalendarObject { &self.object }
    pub fn object_mut(&mut self) -> &mut CalendarObject { &mut self.object }

    pub fn set_object(&mut self, object: CalendarObject) {
        self.object = object;
    }

    /// Write the resource if it has changed. Returns whether anything was written.
    ///
    /// A resource that has never been saved is POSTed to the collection's add-member URL when
    /// there is one, or else PUT at `<collection>/<uid>.ics`.
    pub async fn save_resource<S>(&mut self, session: &Session, store: &S) -> Result<bool>
    where
        S: ResourceStore + Sync + ?Sized,
    {
        if !self.object.changed() {
            log::debug!("Not saving {}: nothing has changed", self.describe());
            return Ok(false);
        }
        if let Some(poll) = self.object.poll() {
            self.object.accept_invite(session, poll)?;
        }

        let body = self.object.to_jcal();
        let stored = match (&self.url, self.calendar.add_member()) {
            (Some(url), _) => store.put(url, self.etag.as_ref(), &body).await?,
            (None, Some(add_member)) => store.create(add_member, &body).await?,
            (None, None) => {
                let uid = self.object.main_component()
                    .and_then(|id| self.object.uid(id))
                    .ok_or_else(|| PollError::structure("a resource needs a UID to be stored"))?;
                let url = self.calendar.child_url(&format!("{}.ics", uid))?;
                store.put(&url, None, &body).await?
            },
        };
        log::info!("Saved {}", stored.url);

        self.url = Some(stored.url);
        self.etag = stored.etag;
        match stored.data {
            Some(data) => {
                let floor = self.object.item_id_floor();
                self.object = CalendarObject::from_jcal(data)?;
                self.object.raise_item_id_floor(floor);
            },
            None => self.object.set_changed(false),
        }
        Ok(true)
    }

    /// Delete the resource from the store. Resources that were never saved only exist locally
    pub async fn remove_resource<S>(&mut self, store: &S) -> Result<bool>
    where
        S: ResourceStore + Sync + ?Sized,
    {
        let url = match &self.url {
            None => return Ok(false),
            Some(url) => url.clone(),
        };
        store.delete(&url, self.etag.as_ref()).await?;
        log::info!("Deleted {}", url);
        self.url = None;
        self.etag = None;
        Ok(true)
    }

    fn describe(&self) -> String {
        match &self.url {
            Some(url) => url.to_string(),
            None => format!("new resource in {}", self.calendar.url()),
        }
    }
}

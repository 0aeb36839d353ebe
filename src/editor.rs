//! An editing session over a poll resource.
//!
//! Changes are made on a duplicate of the loaded poll, so that they can be thrown away with [`PollEditor::cancel`].
//! Nothing reaches the server until [`PollEditor::save`] (or [`PollEditor::pick_winner`]) is called.

use crate::component::{CalendarObject, ComponentId, ComponentKind};
use crate::error::{PollError, Result};
use crate::resource::CalendarResource;
use crate::response::Response;
use crate::session::Session;
use crate::temporal::{FieldType, Role, TemporalValue};
use crate::traits::ResourceStore;

pub struct PollEditor {
    resource: CalendarResource,
    owned: bool,
    completed: bool,
    editing: Option<CalendarObject>,
}

impl PollEditor {
    pub fn new(session: &Session, resource: CalendarResource) -> Result<Self> {
        let object = resource.object();
        let poll = object.poll().ok_or_else(|| PollError::structure("this resource does not hold a poll"))?;
        let owned = object.is_owned(session, poll);
        let completed = !object.editable(poll);
        Ok(Self { resource, owned, completed, editing: None })
    }

    pub fn resource(&self) -> &CalendarResource { &self.resource }
    /// Whether the session principal organizes this poll
    pub fn owned(&self) -> bool { self.owned }
    /// Whether a winner has been picked (or the poll was closed some other way)
    pub fn completed(&self) -> bool { self.completed }
    pub fn is_open(&self) -> bool { self.editing.is_some() }

    /// The poll being shown: the editing copy if any, else the loaded one
    fn current(&self) -> &CalendarObject {
        self.editing.as_ref().unwrap_or_else(|| self.resource.object())
    }

    pub fn title(&self) -> Option<&str> {
        let object = self.current();
        object.poll().and_then(|poll| object.summary(poll))
    }

    /// Start editing a copy of the loaded poll. An editing session already open is kept
    pub fn open(&mut self) -> &mut CalendarObject {
        let resource = &self.resource;
        self.editing.get_or_insert_with(|| resource.object().duplicate())
    }

    /// Throw away every unsaved change
    pub fn cancel(&mut self) {
        if let Some(editing) = self.editing.take() {
            // Ids handed out by the dropped copy stay spent
            self.resource.object_mut().raise_item_id_floor(editing.item_id_floor());
            if editing.changed() {
                log::info!("Discarding unsaved changes to {:?}", self.title());
            }
        }
    }

    pub fn editing(&self) -> Option<&CalendarObject> {
        self.editing.as_ref()
    }

    pub fn editing_mut(&mut self) -> Result<&mut CalendarObject> {
        self.editing.as_mut().ok_or_else(|| PollError::structure("the poll is not open for editing"))
    }

    fn editing_poll(&mut self) -> Result<(&mut CalendarObject, ComponentId)> {
        let editing = self.editing_mut()?;
        let poll = editing.poll().ok_or_else(|| PollError::structure("the edited resource does not hold a poll"))?;
        Ok((editing, poll))
    }

    /// Store the edited poll if it has changed. Returns whether anything was written.
    ///
    /// On success, editing goes on with a fresh copy of what the server stored.
    /// On failure, the edited copy is kept so that saving can be attempted again.
    pub async fn save<S>(&mut self, session: &Session, store: &S) -> Result<bool>
    where
        S: ResourceStore + Sync + ?Sized,
    {
        let editing = match self.editing.take() {
            None => return Ok(false),
            Some(editing) => editing,
        };
        if !editing.changed() {
            log::debug!("Nothing to save in {:?}", editing.poll().and_then(|poll| editing.summary(poll)));
            self.editing = Some(editing);
            return Ok(false);
        }

        let previous = std::mem::replace(self.resource.object_mut(), editing);
        match self.resource.save_resource(session, store).await {
            Ok(saved) => {
                self.editing = Some(self.resource.object().duplicate());
                Ok(saved)
            },
            Err(err) => {
                log::warn!("Unable to save the poll: {}", err);
                let failed = std::mem::replace(self.resource.object_mut(), previous);
                self.editing = Some(failed);
                Err(err)
            },
        }
    }

    /// Add an event or task choice, and vote OK for it. Returns its poll-item-id.
    ///
    /// The first choice starts in an hour and lasts one hour. The following ones copy the last
    /// choice one day later. A choice whose end is a DURATION keeps that duration.
    pub fn add_choice(&mut self, session: &Session, kind: ComponentKind) -> Result<i64> {
        let (editing, poll) = self.editing_poll()?;

        let choice = match editing.choices(poll).last().copied() {
            None => {
                let mut start = TemporalValue::now(session, Role::Start);
                start.add_hours(1)?;
                let mut end = start.duplicate_as(Role::End);
                end.add_hours(1)?;
                end.set_field_type(session.preferred_end_type());
                editing.make_choice(session, poll, kind, &start, &end)?
            },
            Some(last) => {
                let mut start = editing.start(session, last)?;
                let mut end = editing.end(session, last)?;
                let copy = editing.duplicate_component(last)?;
                start.add_days(1)?;
                editing.set_start(copy, start)?;
                if end.field_type() != FieldType::Duration {
                    end.add_days(1)?;
                    editing.set_end(session, copy, end)?;
                }
                copy
            },
        };

        let item_id = editing.next_poll_item_id(poll)?;
        editing.set_poll_item_id(choice, item_id)?;
        editing.save_choice(poll, choice)?;
        editing.change_voter_response(session, poll, item_id, Response::Ok)?;
        log::debug!("Added choice {}", item_id);
        Ok(item_id)
    }

    /// Record the principal's response to a choice
    pub fn respond(&mut self, session: &Session, item_id: i64, response: Response) -> Result<()> {
        let (editing, poll) = self.editing_poll()?;
        if !editing.editable(poll) {
            return Err(PollError::structure("votes can only change while the poll is in process"));
        }
        if editing.get_choice(poll, item_id).is_none() {
            return Err(PollError::structure(format!("the poll has no choice {}", item_id)));
        }
        editing.change_voter_response(session, poll, item_id, response)
    }

    /// The poll-item-ids of the choices, earliest start first
    pub fn sorted_choices(&mut self, session: &Session) -> Result<Vec<i64>> {
        let (editing, poll) = self.editing_poll()?;
        let mut keyed = Vec::new();
        for choice in editing.choices(poll) {
            let start = editing.start(session, choice)?.epoch_millis();
            if let Some(item_id) = editing.poll_item_id(choice) {
                keyed.push((start, item_id));
            }
        }
        keyed.sort();
        Ok(keyed.into_iter().map(|(_, item_id)| item_id).collect())
    }

    pub fn overall_results(&self) -> Vec<(i64, Response)> {
        let object = self.current();
        match object.poll() {
            None => Vec::new(),
            Some(poll) => object.overall_results(poll),
        }
    }

    /// Make `item_id` the winner. The winning event or task is stored in the principal's
    /// calendars first, then the confirmed poll is saved.
    ///
    /// If the winner cannot be stored, the editing copy goes back to how it was and the pick
    /// can be attempted again. If only the poll could not be saved, the editing copy stays
    /// confirmed and [`PollEditor::save`] has to be retried.
    pub async fn pick_winner<S>(&mut self, session: &Session, store: &S, item_id: i64) -> Result<CalendarResource>
    where
        S: ResourceStore + Sync + ?Sized,
    {
        if self.completed {
            return Err(PollError::structure("this poll already has a winner"));
        }
        let (editing, poll) = self.editing_poll()?;
        let choice = editing.get_choice(poll, item_id)
            .ok_or_else(|| PollError::structure(format!("the poll has no choice {}", item_id)))?;
        let before = editing.clone();
        let winner = editing.pick_as_winner(choice)?;

        let mut resource = CalendarResource::for_winner(session, winner)?;
        if let Err(err) = resource.save_resource(session, store).await {
            log::warn!("Unable to store the winner of {:?}: {}", self.title(), err);
            self.editing = Some(before);
            return Err(err);
        }
        self.save(session, store).await?;
        self.completed = true;
        log::info!("Choice {} won {:?}", item_id, self.title());
        Ok(resource)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarCollection, SupportedComponents};
    use crate::component::tests::jane;
    use crate::error::ErrorKind;
    use crate::mock::{MockBehaviour, MockServer};
    use url::Url;

    fn session() -> Session {
        let mut session = jane().with_default_calendar_path("calendar");
        let polls = CalendarCollection::new(Url::parse("https://cal.example.com/jane/polls/").unwrap(), None, SupportedComponents::POLL)
            .with_add_member(Url::parse("https://cal.example.com/jane/polls/add-member").unwrap());
        let events = CalendarCollection::new(Url::parse("https://cal.example.com/jane/calendar/").unwrap(), None, SupportedComponents::EVENT);
        session.add_calendar(polls);
        session.add_calendar(events);
        session
    }

    fn editor(session: &Session) -> PollEditor {
        let resource = CalendarResource::new_poll(session, "Board meeting").unwrap();
        PollEditor::new(session, resource).unwrap()
    }

    #[test]
    fn adding_choices() {
        let session = session();
        let mut editor = editor(&session);
        assert!(editor.owned());
        assert!(!editor.completed());
        assert!(matches!(editor.add_choice(&session, ComponentKind::Event), Err(err) if err.kind() == ErrorKind::StructuralInvariantViolation));

        editor.open();
        assert_eq!(editor.add_choice(&session, ComponentKind::Event).unwrap(), 1);
        assert_eq!(editor.add_choice(&session, ComponentKind::Event).unwrap(), 2);

        let editing = editor.editing_mut().unwrap();
        let poll = editing.poll().unwrap();
        let first = editing.get_choice(poll, 1).unwrap();
        let second = editing.get_choice(poll, 2).unwrap();
        let first_start = editing.start(&session, first).unwrap();
        let second_start = editing.start(&session, second).unwrap();
        assert_eq!(second_start.diff(&first_start, crate::temporal::TimeUnit::Days), 1);
        let second_end = editing.end(&session, second).unwrap();
        assert_eq!(second_end.diff(&second_start, crate::temporal::TimeUnit::Hours), 1);
        assert_eq!(editing.summary(first), Some("Board meeting"));

        let voter = editing.get_voter(poll, "mailto:jane@example.com").unwrap();
        assert_eq!(editing.response_normalised(voter, 1), Response::Ok);
        assert_eq!(editing.response_normalised(voter, 2), Response::Ok);
        assert_eq!(editor.sorted_choices(&session).unwrap(), vec![1, 2]);
    }

    #[test]
    fn cancelling_drops_changes() {
        let session = session();
        let mut editor = editor(&session);
        editor.open();
        editor.add_choice(&session, ComponentKind::Event).unwrap();
        editor.cancel();
        assert!(!editor.is_open());
        assert!(editor.overall_results().is_empty());
        assert_eq!(editor.title(), Some("Board meeting"));
        assert!(!editor.resource().object().changed());

        editor.open();
        assert_eq!(editor.add_choice(&session, ComponentKind::Event).unwrap(), 2);
    }

    #[tokio::test]
    async fn saving_and_retrying() {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = session();
        let server = MockServer::with_behaviour(MockBehaviour::fail_now(1));
        let mut editor = editor(&session);

        assert!(!editor.save(&session, &server).await.unwrap());
        editor.open();
        editor.add_choice(&session, ComponentKind::Event).unwrap();

        let err = editor.save(&session, &server).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(editor.editing().unwrap().changed());
        assert!(editor.resource().url().is_none());

        assert!(editor.save(&session, &server).await.unwrap());
        let url = editor.resource().url().unwrap().clone();
        assert_eq!(url.as_str(), "https://cal.example.com/jane/polls/created-1.ics");
        assert!(server.resource(&url).is_some());
        assert!(!editor.editing().unwrap().changed());
        assert!(!editor.save(&session, &server).await.unwrap());

        // Ids handed out before the save are not reused
        assert_eq!(editor.add_choice(&session, ComponentKind::Event).unwrap(), 2);
    }

    #[tokio::test]
    async fn picking_the_winner() {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = session();
        let server = MockServer::new();
        let mut editor = editor(&session);
        editor.open();
        editor.add_choice(&session, ComponentKind::Event).unwrap();
        editor.add_choice(&session, ComponentKind::Event).unwrap();
        editor.respond(&session, 1, Response::Best).unwrap();
        assert!(editor.respond(&session, 7, Response::Best).is_err());
        editor.save(&session, &server).await.unwrap();

        let winner = editor.pick_winner(&session, &server, 1).await.unwrap();
        assert!(editor.completed());
        assert_eq!(server.resource_count(), 2);
        let winner_url = winner.url().unwrap();
        assert!(winner_url.as_str().starts_with("https://cal.example.com/jane/calendar/"));
        assert!(server.resource(winner_url).unwrap().main_component().unwrap().is_event());

        let editing = editor.editing().unwrap();
        let poll = editing.poll().unwrap();
        assert_eq!(editing.status(poll), Some("CONFIRMED"));
        assert_eq!(editing.poll_winner(poll), Some(1));
        assert!(!editing.changed());
        assert_eq!(editor.respond(&session, 2, Response::No).unwrap_err().kind(), ErrorKind::StructuralInvariantViolation);

        let err = editor.pick_winner(&session, &server, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
        assert_eq!(server.resource_count(), 2);
        let editing = editor.editing().unwrap();
        assert_eq!(editing.poll_winner(editing.poll().unwrap()), Some(1));
    }

    #[tokio::test]
    async fn failing_to_store_the_winner() {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = session();
        let server = MockServer::new();
        let mut editor = editor(&session);
        editor.open();
        editor.add_choice(&session, ComponentKind::Event).unwrap();
        editor.save(&session, &server).await.unwrap();

        // The events collection has no add-member URL: the winner is written with a PUT
        server.set_behaviour(MockBehaviour { put_behaviour: (0, 1), ..MockBehaviour::default() });
        let err = editor.pick_winner(&session, &server, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(!editor.completed());
        assert_eq!(server.resource_count(), 1);

        let editing = editor.editing().unwrap();
        let poll = editing.poll().unwrap();
        assert!(editing.editable(poll));
        assert_eq!(editing.poll_winner(poll), None);
        assert!(!editing.changed());

        editor.pick_winner(&session, &server, 1).await.unwrap();
        assert!(editor.completed());
        assert_eq!(server.resource_count(), 2);
    }
}

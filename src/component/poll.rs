//! VPOLL operations: choices, attendees, tallies and picking a winner

use serde_json::{Map, Value};

use crate::component::{CalendarObject, ComponentId, ComponentKind};
use crate::error::{PollError, Result};
use crate::jcal::{new_calendar, JcalComponent, JcalProperty};
use crate::response::{Response, Tally};
use crate::session::Session;
use crate::temporal::{Role, TemporalValue};
use crate::user::{CalendarUser, CalendarUserMut};

impl CalendarObject {
    /// A new calendar holding a VPOLL organized by the session principal, who is also its first voter
    pub fn new_poll(session: &Session, title: &str) -> Result<Self> {
        let principal = session.principal();
        let address = principal.default_address()
            .ok_or_else(|| PollError::structure("the current principal has no calendar user address"))?
            .to_string();
        let mut organizer_params = Map::new();
        if let Some(cn) = principal.cn() {
            organizer_params.insert("cn".to_string(), Value::from(cn));
        }

        let mut calendar = new_calendar();
        let vpoll = calendar.new_component(ComponentKind::Poll.name(), true);
        vpoll.update_property("summary", title, Map::new(), "text");
        vpoll.update_property("poll-mode", "BASIC", Map::new(), "text");
        vpoll.push_property(JcalProperty::with_values("poll-properties", Map::new(), "text", vec![Value::from("DTSTART"), Value::from("DTEND")]));
        vpoll.update_property("organizer", address.as_str(), organizer_params.clone(), "cal-address");

        let mut object = Self::from_jcal(calendar)?;
        let poll = object.main_component().ok_or_else(|| PollError::structure("the new calendar has no VPOLL"))?;
        let voter = object.add_voter(poll)?;
        let mut voter_params = organizer_params;
        voter_params.insert("partstat".to_string(), Value::from("ACCEPTED"));
        object.update_voter(voter, &address, voter_params)?;
        // Never saved, so it must be written on the next save
        object.mark_changed();
        Ok(object)
    }

    /// The main VPOLL of this resource, if it is a poll
    pub fn poll(&self) -> Option<ComponentId> {
        self.main_component().filter(|id| self.kind(*id) == Some(ComponentKind::Poll))
    }

    /// Votes can only be changed while the poll is in process
    pub fn editable(&self, poll: ComponentId) -> bool {
        match self.status(poll) {
            None => true,
            Some(status) => status == "IN-PROCESS",
        }
    }

    /// The events and tasks being voted on
    pub fn choices(&self, poll: ComponentId) -> Vec<ComponentId> {
        self.children(poll)
            .into_iter()
            .filter(|id| matches!(self.kind(*id), Some(ComponentKind::Event) | Some(ComponentKind::Task)))
            .filter(|id| self.poll_item_id(*id).is_some())
            .collect()
    }

    pub fn get_choice(&self, poll: ComponentId, item_id: i64) -> Option<ComponentId> {
        self.choices(poll).into_iter().find(|choice| self.poll_item_id(*choice) == Some(item_id))
    }

    /// Remove every choice with this poll-item-id
    pub fn remove_choice(&mut self, poll: ComponentId, item_id: i64) -> Result<bool> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        let doomed: Vec<ComponentId> = self.choices(poll)
            .into_iter()
            .filter(|choice| self.poll_item_id(*choice) == Some(item_id))
            .collect();
        if doomed.is_empty() {
            return Ok(false);
        }
        for choice in doomed {
            self.remove_component(choice)?;
        }
        self.mark_changed();
        Ok(true)
    }

    /// Remove the `index`th choice. Returns false if there is none
    pub fn remove_indexed_choice(&mut self, poll: ComponentId, index: usize) -> Result<bool> {
        let item_id = match self.choices(poll).get(index).and_then(|choice| self.poll_item_id(*choice)) {
            None => return Ok(false),
            Some(item_id) => item_id,
        };
        self.remove_choice(poll, item_id)
    }

    /// A poll-item-id that has never been used in this poll, nor handed out before
    pub fn next_poll_item_id(&mut self, poll: ComponentId) -> Result<i64> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        let highest = self.descendants(poll)
            .into_iter()
            .filter_map(|id| self.poll_item_id(id))
            .fold(self.item_id_floor, i64::max);
        let next = highest + 1;
        self.raise_item_id_floor(next);
        Ok(next)
    }

    /// Prepare a new event or task choice. It is detached until `save_choice` is called
    pub fn make_choice(&mut self, session: &Session, poll: ComponentId, kind: ComponentKind, start: &TemporalValue, end: &TemporalValue) -> Result<ComponentId> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        if kind != ComponentKind::Event && kind != ComponentKind::Task {
            return Err(PollError::structure(format!("a poll choice cannot be a {}", kind.name())));
        }

        let start = start.duplicate_as(Role::Start);
        let mut end_value = end.duplicate_as(Role::End);
        end_value.set_field_type(end.field_type());

        let mut data = JcalComponent::with_defaults(kind.name());
        start.update_property(&mut data, None)?;
        end_value.update_property(&mut data, Some(&start))?;
        if let Some(summary) = self.summary(poll) {
            data.update_property("summary", summary, Map::new(), "text");
        }
        if let Some(poll_data) = self.data(poll) {
            data.copy_property("organizer", poll_data);
        }

        let choice = self.insert_tree(data, Some(poll), kind);
        self.sync_attendees(session, poll, choice)?;
        let node = self.node_mut(choice)?;
        node.start = Some(start);
        node.end = Some(end_value);
        Ok(choice)
    }

    /// Attach a choice (typically from `make_choice` or `duplicate_component`) to the poll.
    /// Nothing happens if the poll already has a choice with the same poll-item-id.
    pub fn save_choice(&mut self, poll: ComponentId, choice: ComponentId) -> Result<bool> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        let item_id = self.poll_item_id(choice)
            .ok_or_else(|| PollError::structure("a choice needs a poll-item-id before it is saved"))?;
        if self.get_choice(poll, item_id).is_some() {
            return Ok(false);
        }
        self.attach(poll, choice)?;
        self.mark_changed();
        Ok(true)
    }

    /// Rebuild the attendees of `choice` from the poll's voters
    pub fn sync_attendees(&mut self, session: &Session, poll: ComponentId, choice: ComponentId) -> Result<()> {
        let voters: Vec<JcalProperty> = self.voters(poll)
            .into_iter()
            .filter_map(|voter| self.voter_identity(voter).map(|user| user.property().clone()))
            .collect();

        let node = self.node_mut(choice)?;
        node.data.remove_properties("attendee");
        for voter in &voters {
            let voter = CalendarUser::new(voter);
            let mut attendee = JcalProperty::new("attendee", Map::new(), "cal-address", voter.cuaddr());
            {
                let mut user = CalendarUserMut::new(&mut attendee);
                user.set_cn(voter.cn());
                user.set_cutype(voter.cutype());
                if session.principal().matching_address(voter.cuaddr()) {
                    user.set_partstat("ACCEPTED");
                } else {
                    user.set_partstat("NEEDS-ACTION");
                    user.set_rsvp(true);
                }
            }
            node.data.push_property(attendee);
        }
        self.mark_changed();
        Ok(())
    }

    /// Turn attendee syncing on for the poll, and sync every choice
    pub fn sync_all_attendees(&mut self, session: &Session, poll: ComponentId) -> Result<()> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        self.set_property_value(poll, "x-bw-syncattendees", Some(Value::from("on")), "text")?;
        for choice in self.choices(poll) {
            self.sync_attendees(session, poll, choice)?;
        }
        Ok(())
    }

    /// How the voters answered choice `item_id`
    pub fn tally(&self, poll: ComponentId, item_id: i64) -> Tally {
        Tally::from_responses(self.voters(poll).into_iter().map(|voter| self.response_normalised(voter, item_id)))
    }

    /// The overall response of every choice, in document order
    pub fn overall_results(&self, poll: ComponentId) -> Vec<(i64, Response)> {
        self.choices(poll)
            .into_iter()
            .filter_map(|choice| self.poll_item_id(choice))
            .map(|item_id| (item_id, self.tally(poll, item_id).overall()))
            .collect()
    }

    /// Confirm the poll with `choice` as its winner, and return a new resource holding a copy
    /// of the winning event or task
    pub fn pick_as_winner(&mut self, choice: ComponentId) -> Result<CalendarObject> {
        let poll = self.parent(choice)
            .filter(|parent| self.kind(*parent) == Some(ComponentKind::Poll))
            .ok_or_else(|| PollError::structure("only a choice of a poll can win it"))?;
        if !self.editable(poll) {
            return Err(PollError::structure("a winner can only be picked while the poll is in process"));
        }
        let item_id = self.poll_item_id(choice)
            .ok_or_else(|| PollError::structure("the winning choice has no poll-item-id"))?;
        let winner = self.component_to_jcal(choice)
            .ok_or_else(|| PollError::structure("the winning choice does not exist"))?;

        self.set_property_value(poll, "status", Some(Value::from("CONFIRMED")), "text")?;
        self.set_poll_winner(poll, item_id)?;
        self.mark_changed();

        let mut calendar = new_calendar();
        calendar.add_component(winner);
        let mut object = CalendarObject::from_jcal(calendar)?;
        object.mark_changed();
        Ok(object)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::{jane, sample_poll};
    use crate::error::ErrorKind;
    use crate::temporal::FieldType;

    #[test]
    fn new_polls() {
        let session = jane();
        let object = CalendarObject::new_poll(&session, "Planning meeting").unwrap();
        assert!(object.changed());
        let poll = object.poll().unwrap();
        assert_eq!(object.summary(poll), Some("Planning meeting"));
        assert_eq!(object.property_text(poll, "poll-mode"), Some("BASIC"));
        assert_eq!(object.property(poll, "poll-properties").unwrap().values().len(), 2);
        assert!(object.is_owned(&session, poll));
        assert_eq!(object.organizer_display_name(poll), Some("Jane Doe"));
        assert!(object.editable(poll));
        assert!(object.choices(poll).is_empty());

        let voters = object.voters(poll);
        assert_eq!(voters.len(), 1);
        let me = object.voter_identity(voters[0]).unwrap();
        assert_eq!(me.cuaddr(), "mailto:jane@example.com");
        assert_eq!(me.partstat(), "ACCEPTED");
        assert_eq!(me.cn(), Some("Jane Doe"));
    }

    #[test]
    fn choices_ignore_voters() {
        let object = sample_poll();
        let poll = object.poll().unwrap();
        let choices = object.choices(poll);
        assert_eq!(choices.len(), 2);
        assert_eq!(object.get_choice(poll, 2), Some(choices[1]));
        assert_eq!(object.get_choice(poll, 3), None);
        assert!(object.is_event(choices[0]));
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        assert!(object.remove_choice(poll, 2).unwrap());
        assert!(object.changed());
        assert_eq!(object.choices(poll).len(), 1);
        assert!(!object.remove_choice(poll, 2).unwrap());

        let next = object.next_poll_item_id(poll).unwrap();
        assert_eq!(next, 3);
        assert_eq!(object.next_poll_item_id(poll).unwrap(), 4);

        assert!(object.remove_indexed_choice(poll, 0).unwrap());
        assert!(object.choices(poll).is_empty());
        assert!(!object.remove_indexed_choice(poll, 0).unwrap());
        assert_eq!(object.next_poll_item_id(poll).unwrap(), 5);
    }

    #[test]
    fn making_and_saving_choices() {
        let session = jane();
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        let first = object.choices(poll)[0];
        let start = object.start(&session, first).unwrap();
        let mut end = object.end(&session, first).unwrap();
        end.set_field_type(FieldType::Duration);

        let choice = object.make_choice(&session, poll, ComponentKind::Task, &start, &end).unwrap();
        assert!(!object.is_attached(choice));
        assert_eq!(object.summary(choice), Some("Team lunch"));
        assert_eq!(object.property_text(choice, "duration"), Some("PT1H"));
        assert_eq!(object.organizer(choice).unwrap().cuaddr(), "mailto:jane@example.com");

        let attendees = object.attendees(choice);
        assert_eq!(attendees.len(), 2);
        assert_eq!(attendees[0].partstat(), "ACCEPTED");
        assert!(!attendees[0].rsvp());
        assert_eq!(attendees[1].cuaddr(), "mailto:joe@example.com");
        assert_eq!(attendees[1].partstat(), "NEEDS-ACTION");
        assert!(attendees[1].rsvp());

        assert_eq!(object.save_choice(poll, choice).unwrap_err().kind(), ErrorKind::StructuralInvariantViolation);
        let item_id = object.next_poll_item_id(poll).unwrap();
        object.set_poll_item_id(choice, item_id).unwrap();
        assert!(object.save_choice(poll, choice).unwrap());
        assert!(object.is_attached(choice));
        assert!(!object.save_choice(poll, choice).unwrap());
        assert_eq!(object.choices(poll).len(), 3);

        let err = object.make_choice(&session, poll, ComponentKind::Voter, &start, &end).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
    }

    #[test]
    fn tallies() {
        let object = sample_poll();
        let poll = object.poll().unwrap();
        let tally = object.tally(poll, 1);
        assert_eq!(tally.count(Response::Best), 1);
        assert_eq!(tally.count(Response::Ok), 1);
        assert_eq!(object.overall_results(poll), vec![(1, Response::Best), (2, Response::None)]);
    }

    #[test]
    fn picking_a_winner() {
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        let choice = object.get_choice(poll, 1).unwrap();

        let winner = object.pick_as_winner(choice).unwrap();
        assert!(object.changed());
        assert_eq!(object.status(poll), Some("CONFIRMED"));
        assert_eq!(object.poll_winner(poll), Some(1));
        assert!(object.is_poll_winner(choice));
        assert!(!object.editable(poll));

        assert!(winner.changed());
        let event = winner.main_component().unwrap();
        assert_eq!(winner.kind(event), Some(ComponentKind::Event));
        assert_eq!(winner.uid(event), Some("choice-1"));
        assert_eq!(winner.opaque_children(event).len(), 1);

        assert!(object.pick_as_winner(poll).is_err());
    }

    #[test]
    fn a_confirmed_poll_keeps_its_winner() {
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        let first = object.get_choice(poll, 1).unwrap();
        let second = object.get_choice(poll, 2).unwrap();
        object.pick_as_winner(first).unwrap();

        let err = object.pick_as_winner(second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
        assert_eq!(object.poll_winner(poll), Some(1));
        assert!(!object.is_poll_winner(second));
    }

    #[test]
    fn syncing_every_choice() {
        let session = jane();
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        object.sync_all_attendees(&session, poll).unwrap();
        assert_eq!(object.property_text(poll, "x-bw-syncattendees"), Some("on"));
        for choice in object.choices(poll) {
            assert_eq!(object.attendees(choice).len(), 2);
        }
    }
}

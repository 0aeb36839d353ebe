//! Voters of a poll (VVOTER components) and their votes (VOTE sub-components)

use serde_json::{Map, Value};

use crate::component::{CalendarObject, ComponentId, ComponentKind};
use crate::error::{PollError, Result};
use crate::jcal::JcalComponent;
use crate::response::Response;
use crate::session::Session;
use crate::user::CalendarUser;

impl CalendarObject {
    pub fn voters(&self, poll: ComponentId) -> Vec<ComponentId> {
        self.children(poll)
            .into_iter()
            .filter(|id| self.kind(*id) == Some(ComponentKind::Voter))
            .collect()
    }

    /// The VOTER property of a VVOTER component
    pub fn voter_identity(&self, voter: ComponentId) -> Option<CalendarUser<'_>> {
        self.property(voter, "voter").map(CalendarUser::new)
    }

    /// The voter whose address is `cuaddr`
    pub fn get_voter(&self, poll: ComponentId, cuaddr: &str) -> Option<ComponentId> {
        self.voters(poll)
            .into_iter()
            .find(|voter| self.voter_identity(*voter).map(|user| user.cuaddr() == cuaddr).unwrap_or(false))
    }

    pub fn votes(&self, voter: ComponentId) -> Vec<ComponentId> {
        self.children(voter)
            .into_iter()
            .filter(|id| self.kind(*id) == Some(ComponentKind::Vote))
            .collect()
    }

    pub fn get_vote(&self, voter: ComponentId, item_id: i64) -> Option<ComponentId> {
        self.votes(voter).into_iter().find(|vote| self.poll_item_id(*vote) == Some(item_id))
    }

    /// The raw RESPONSE of a vote
    pub fn vote_response(&self, vote: ComponentId) -> Option<i64> {
        self.property_i64(vote, "response")
    }

    /// Store a raw response, or remove it. Marks the object changed if it differs
    pub fn set_vote_response(&mut self, vote: ComponentId, response: Option<i64>) -> Result<bool> {
        self.expect_kind(vote, ComponentKind::Vote)?;
        self.set_property_value(vote, "response", response.map(Value::from), "integer")
    }

    /// How `voter` answered choice `item_id`
    pub fn response_normalised(&self, voter: ComponentId, item_id: i64) -> Response {
        Response::normalise(self.get_vote(voter, item_id).and_then(|vote| self.vote_response(vote)))
    }

    /// The voter's vote for `item_id`, created if it does not exist yet
    pub fn add_vote(&mut self, voter: ComponentId, item_id: i64) -> Result<ComponentId> {
        self.expect_kind(voter, ComponentKind::Voter)?;
        if let Some(vote) = self.get_vote(voter, item_id) {
            return Ok(vote);
        }

        let mut data = JcalComponent::new(ComponentKind::Vote.name());
        data.update_property("poll-item-id", item_id, Map::new(), "integer");
        let vote = self.attach_new(voter, data, ComponentKind::Vote)?;
        self.mark_changed();
        Ok(vote)
    }

    /// Record the session principal's answer to choice `item_id`.
    ///
    /// Exactly one voter of the poll must be the principal. Nothing is written if the stored
    /// response already reads as `response`.
    pub fn change_voter_response(&mut self, session: &Session, poll: ComponentId, item_id: i64, response: Response) -> Result<()> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        let principal = session.principal();
        let mine: Vec<ComponentId> = self.voters(poll)
            .into_iter()
            .filter(|voter| self.voter_identity(*voter).map(|user| principal.matching_address(user.cuaddr())).unwrap_or(false))
            .collect();
        if mine.len() != 1 {
            return Err(PollError::structure(format!(
                "expected exactly one voter for {}, found {}",
                principal.default_address().unwrap_or(principal.href()),
                mine.len()
            )));
        }

        let vote = self.add_vote(mine[0], item_id)?;
        let current = self.vote_response(vote);
        if current.is_some() && Response::normalise(current) == response {
            log::debug!("Response to choice {} is already {:?}", item_id, response);
            return Ok(());
        }
        self.set_vote_response(vote, response.unnormalise())?;
        Ok(())
    }

    /// Append a voter with an empty address, to be filled with `update_voter`
    pub fn add_voter(&mut self, poll: ComponentId) -> Result<ComponentId> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        let mut data = JcalComponent::new(ComponentKind::Voter.name());
        data.new_property("voter", "", Map::new(), "cal-address");
        let voter = self.attach_new(poll, data, ComponentKind::Voter)?;
        self.mark_changed();
        Ok(voter)
    }

    /// Set the voter's address and parameters
    pub fn update_voter(&mut self, voter: ComponentId, cuaddr: &str, params: Map<String, Value>) -> Result<bool> {
        self.expect_kind(voter, ComponentKind::Voter)?;
        self.update_user(voter, "voter", 0, |user| user.update(cuaddr, params))
    }

    /// Remove the `index`th voter. A poll always keeps at least one voter.
    /// Returns false if there is no such voter.
    pub fn remove_voter(&mut self, poll: ComponentId, index: usize) -> Result<bool> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        let voters = self.voters(poll);
        if voters.len() <= 1 {
            return Err(PollError::structure("Must have at least 1 voter"));
        }
        let voter = match voters.get(index) {
            None => return Ok(false),
            Some(voter) => *voter,
        };
        self.remove_component(voter)?;
        self.mark_changed();
        Ok(true)
    }

    /// When the principal is invited to someone else's poll, its voter entries become ACCEPTED
    pub fn accept_invite(&mut self, session: &Session, poll: ComponentId) -> Result<bool> {
        self.expect_kind(poll, ComponentKind::Poll)?;
        if self.is_owned(session, poll) {
            return Ok(false);
        }

        let mine: Vec<ComponentId> = self.voters(poll)
            .into_iter()
            .filter(|voter| self.voter_identity(*voter).map(|user| session.principal().matching_address(user.cuaddr())).unwrap_or(false))
            .collect();
        let mut modified = false;
        for voter in mine {
            modified |= self.update_user(voter, "voter", 0, |user| {
                user.set_partstat("ACCEPTED");
                user.set_rsvp(false);
            })?;
        }
        Ok(modified)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::{jane, sample_poll};
    use crate::error::ErrorKind;
    use crate::principal::Principal;
    use chrono_tz::Tz;
    use serde_json::json;

    #[test]
    fn reading_votes() {
        let object = sample_poll();
        let poll = object.main_component().unwrap();
        let joe = object.get_voter(poll, "mailto:joe@example.com").unwrap();
        assert_eq!(object.response_normalised(joe, 1), Response::Ok);
        assert_eq!(object.response_normalised(joe, 2), Response::None);
        assert_eq!(object.voter_identity(joe).unwrap().cn(), Some("Joe"));
        assert!(object.get_voter(poll, "mailto:nobody@example.com").is_none());
    }

    #[test]
    fn add_vote_is_idempotent() {
        let mut object = sample_poll();
        let poll = object.main_component().unwrap();
        let joe = object.get_voter(poll, "mailto:joe@example.com").unwrap();

        let first = object.add_vote(joe, 2).unwrap();
        assert!(object.changed());
        object.set_changed(false);
        let second = object.add_vote(joe, 2).unwrap();
        assert_eq!(first, second);
        assert_eq!(object.votes(joe).len(), 2);
        assert!(!object.changed());
    }

    #[test]
    fn changing_my_response() {
        let session = jane();
        let mut object = sample_poll();
        let poll = object.main_component().unwrap();
        let me = object.get_voter(poll, "mailto:jane@example.com").unwrap();

        // 90 already reads as Best
        object.change_voter_response(&session, poll, 1, Response::Best).unwrap();
        assert!(!object.changed());

        object.change_voter_response(&session, poll, 1, Response::Maybe).unwrap();
        assert!(object.changed());
        let vote = object.get_vote(me, 1).unwrap();
        assert_eq!(object.vote_response(vote), Some(40));
    }

    #[test]
    fn strangers_cannot_vote() {
        let stranger = Session::new(Principal::new("/principals/bob/", None, vec!["mailto:bob@example.com".to_string()]), Tz::UTC);
        let mut object = sample_poll();
        let poll = object.main_component().unwrap();
        let err = object.change_voter_response(&stranger, poll, 1, Response::Ok).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
        assert!(!object.changed());
    }

    #[test]
    fn voters_come_and_go() {
        let mut object = sample_poll();
        let poll = object.main_component().unwrap();
        let new_voter = object.add_voter(poll).unwrap();
        assert_eq!(object.voters(poll).len(), 3);
        assert_eq!(object.voter_identity(new_voter).unwrap().cuaddr(), "");

        let mut params = Map::new();
        params.insert("cn".to_string(), json!("Bob"));
        assert!(object.update_voter(new_voter, "mailto:bob@example.com", params).unwrap());
        assert_eq!(object.get_voter(poll, "mailto:bob@example.com"), Some(new_voter));

        assert!(object.remove_voter(poll, 0).unwrap());
        assert!(!object.remove_voter(poll, 7).unwrap());
        assert!(object.remove_voter(poll, 0).unwrap());
        let err = object.remove_voter(poll, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
        assert_eq!(object.voters(poll), vec![new_voter]);
    }

    #[test]
    fn invitations_are_accepted() {
        let joe = Session::new(Principal::new("/principals/joe/", Some("Joe".to_string()), vec!["mailto:joe@example.com".to_string()]), Tz::UTC);
        let mut object = sample_poll();
        let poll = object.main_component().unwrap();
        let voter = object.get_voter(poll, "mailto:joe@example.com").unwrap();
        object.update_user(voter, "voter", 0, |user| user.set_rsvp(true)).unwrap();

        assert!(object.accept_invite(&joe, poll).unwrap());
        let identity = object.voter_identity(voter).unwrap();
        assert_eq!(identity.partstat(), "ACCEPTED");
        assert!(!identity.rsvp());

        // The organizer does not accept their own poll
        let mut object = sample_poll();
        assert!(!object.accept_invite(&jane(), poll).unwrap());
    }
}

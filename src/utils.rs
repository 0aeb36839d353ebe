//! Some utility functions to display polls

use crate::component::{CalendarObject, ComponentId};
use crate::error::{PollError, Result};
use crate::response::Response;
use crate::session::Session;

/// One line describing a choice: winner mark, poll-item-id, summary, start, counts per response and overall result
pub fn choice_line(session: &Session, object: &mut CalendarObject, poll: ComponentId, choice: ComponentId) -> Result<String> {
    let item_id = object.poll_item_id(choice)
        .ok_or_else(|| PollError::structure("a choice has no poll-item-id"))?;
    let start = object.start(session, choice)?;
    let when = if start.all_day() {
        start.printable_date()
    } else {
        format!("{} {}", start.printable_date(), start.printable_time())
    };

    let tally = object.tally(poll, item_id);
    let counts = Response::ALL.iter()
        .rev()
        .map(|response| format!("{}:{}", response.label(), tally.count(*response)))
        .collect::<Vec<_>>()
        .join(" ");
    let mark = if object.is_poll_winner(choice) { "✓" } else { " " };
    let summary = object.summary(choice).unwrap_or("(no summary)");

    Ok(format!("  {} {}\t{}\t{}\t{}\t=> {}", mark, item_id, summary, when, counts, tally.overall().label()))
}

/// A debug utility that pretty-prints a poll and its results
pub fn print_poll(session: &Session, object: &mut CalendarObject) -> Result<()> {
    let poll = object.poll().ok_or_else(|| PollError::structure("this resource does not hold a poll"))?;
    println!("POLL {}", object.summary(poll).unwrap_or("(untitled)"));
    if let Some(organizer) = object.organizer(poll) {
        println!("  organized by {}", organizer.address_description());
    }
    println!("  {} voter(s), status {}", object.voters(poll).len(), object.status(poll).unwrap_or("IN-PROCESS"));
    for choice in object.choices(poll) {
        println!("{}", choice_line(session, object, poll, choice)?);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::{jane, sample_poll};

    #[test]
    fn choice_lines() {
        let session = jane();
        let mut object = sample_poll();
        let poll = object.poll().unwrap();
        let choices = object.choices(poll);

        let first = choice_line(&session, &mut object, poll, choices[0]).unwrap();
        assert!(first.contains("\t12:00\t") || first.contains(" 12:00\t"));
        assert!(first.contains("Best:1 Ok:1 Maybe:0 No:0 No response:0"));
        assert!(first.ends_with("=> Best"));

        object.set_poll_winner(poll, 2).unwrap();
        let second = choice_line(&session, &mut object, poll, choices[1]).unwrap();
        assert!(second.starts_with("  ✓ 2\t"));
        assert!(second.contains("Best:0 Ok:0 Maybe:0 No:1 No response:1"));
    }
}

//! Saving, reloading and deleting poll resources against the mocked server
#![cfg(feature = "integration_tests")]

use chrono_tz::Tz;
use url::Url;

use jcal_poll::calendar::{CalendarCollection, SupportedComponents};
use jcal_poll::error::ErrorKind;
use jcal_poll::mock::{MockBehaviour, MockServer};
use jcal_poll::principal::Principal;
use jcal_poll::{CalendarResource, ComponentKind, PollEditor, Response, Session};

fn session(with_add_member: bool) -> Session {
    let mut principal = Principal::new("/principals/ann/", Some("Ann".to_string()), vec!["mailto:ann@example.com".to_string()]);
    let mut polls = CalendarCollection::new(Url::parse("https://dav.example.com/ann/polls/").unwrap(), Some("Polls".to_string()), SupportedComponents::POLL);
    if with_add_member {
        polls = polls.with_add_member(Url::parse("https://dav.example.com/ann/polls/;add-member").unwrap());
    }
    let tasks = CalendarCollection::new(Url::parse("https://dav.example.com/ann/tasks/").unwrap(), None, SupportedComponents::TODO);
    principal.add_calendar(polls, None);
    principal.add_calendar(tasks, None);
    Session::new(principal, Tz::UTC)
}

#[tokio::test]
async fn polls_go_where_the_collection_says() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::new();

    let with_add_member = session(true);
    let mut resource = CalendarResource::new_poll(&with_add_member, "Offsite").unwrap();
    assert!(resource.save_resource(&with_add_member, &server).await.unwrap());
    assert_eq!(resource.url().unwrap().as_str(), "https://dav.example.com/ann/polls/created-1.ics");

    let without = session(false);
    let mut resource = CalendarResource::new_poll(&without, "Retro").unwrap();
    let poll = resource.object().poll().unwrap();
    let uid = resource.object().uid(poll).unwrap().to_string();
    assert!(resource.save_resource(&without, &server).await.unwrap());
    let url = resource.url().unwrap().clone();
    assert_eq!(url.as_str(), format!("https://dav.example.com/ann/polls/{}.ics", uid));
    assert!(server.resource(&url).is_some());

    // Nothing changed since, so the server is not even asked
    server.set_behaviour(MockBehaviour::fail_now(1));
    assert!(!resource.save_resource(&without, &server).await.unwrap());
    assert_eq!(server.resource_count(), 2);
}

#[tokio::test]
async fn reload_edit_and_conflict() {
    let _ = env_logger::builder().is_test(true).try_init();
    let session = session(true);
    let server = MockServer::new();

    let mut resource = CalendarResource::new_poll(&session, "Offsite").unwrap();
    resource.save_resource(&session, &server).await.unwrap();
    let url = resource.url().unwrap().clone();
    let calendar = resource.calendar().clone();

    let loaded = CalendarResource::fetch(&server, calendar.clone(), &url).await.unwrap();
    assert_eq!(loaded.etag(), resource.etag());
    let mut editor = PollEditor::new(&session, loaded).unwrap();
    assert!(editor.owned());
    assert_eq!(editor.title(), Some("Offsite"));
    editor.open();
    editor.add_choice(&session, ComponentKind::Task).unwrap();
    assert!(editor.save(&session, &server).await.unwrap());

    // `resource` still holds the etag of the first version
    let poll = resource.object().poll().unwrap();
    resource.object_mut().set_summary(poll, Some("Offsite (new date)")).unwrap();
    let err = resource.save_resource(&session, &server).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);

    let reloaded = CalendarResource::fetch(&server, calendar, &url).await.unwrap();
    let object = reloaded.object();
    let poll = object.poll().unwrap();
    assert_eq!(object.summary(poll), Some("Offsite"));
    assert_eq!(object.choices(poll).len(), 1);
    assert_eq!(object.overall_results(poll), vec![(1, Response::None)]);
}

#[tokio::test]
async fn a_failed_fetch_is_reported() {
    let _ = env_logger::builder().is_test(true).try_init();
    let session = session(true);
    let server = MockServer::new();

    let mut resource = CalendarResource::new_poll(&session, "Offsite").unwrap();
    resource.save_resource(&session, &server).await.unwrap();
    let url = resource.url().unwrap().clone();

    server.set_behaviour(MockBehaviour::fail_now(1));
    let err = CalendarResource::fetch(&server, resource.calendar().clone(), &url).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(CalendarResource::fetch(&server, resource.calendar().clone(), &url).await.is_ok());
}

#[tokio::test]
async fn winning_task_and_removal() {
    let _ = env_logger::builder().is_test(true).try_init();
    let session = session(true);
    let server = MockServer::new();

    let resource = CalendarResource::new_poll(&session, "Write the report").unwrap();
    let mut editor = PollEditor::new(&session, resource).unwrap();
    editor.open();
    editor.add_choice(&session, ComponentKind::Task).unwrap();
    editor.add_choice(&session, ComponentKind::Task).unwrap();
    editor.save(&session, &server).await.unwrap();

    let mut winner = editor.pick_winner(&session, &server, 2).await.unwrap();
    assert!(editor.completed());
    let winner_url = winner.url().unwrap().clone();
    assert!(winner_url.as_str().starts_with("https://dav.example.com/ann/tasks/"));
    assert!(server.resource(&winner_url).unwrap().main_component().unwrap().is_task());
    assert_eq!(server.resource_count(), 2);

    assert!(winner.remove_resource(&server).await.unwrap());
    assert!(winner.url().is_none());
    assert!(!winner.remove_resource(&server).await.unwrap());
    assert_eq!(server.resource_count(), 1);
    assert!(server.resource(editor.resource().url().unwrap()).is_some());
}

//! This crate provides a client-side model for jCal calendar data, with a focus on VPOLL scheduling polls.
//!
//! Calendar resources are parsed into a [`CalendarObject`] (see the [`component`] module), a tree of typed components
//! (calendars, polls, events, tasks, voters and votes) that keeps anything it does not know about untouched. \
//! Dates and times are handled by [`TemporalValue`], and votes are read as [`Response`] levels that add up to a [`Tally`].
//!
//! Resources are read from and written to a server through the [`ResourceStore`](traits::ResourceStore) trait.
//! [`HttpStore`](client::HttpStore) implements it over HTTP, and a [`PollEditor`] drives an editing session over a poll resource. \
//! Anything that depends on the current user (their addresses, calendars, timezone...) is passed around in a [`Session`].

pub mod error;
pub use error::{PollError, Result};
pub mod config;
pub mod session;
pub use session::Session;
pub mod principal;
pub use principal::Principal;
pub mod calendar;

pub mod jcal;
pub mod user;
pub mod temporal;
pub use temporal::TemporalValue;
pub mod response;
pub use response::{Response, Tally};
pub mod component;
pub use component::{CalendarObject, ComponentId, ComponentKind};
pub mod recurrence;
pub mod freebusy;

pub mod traits;
pub mod resource;
pub use resource::CalendarResource;
pub mod client;
pub use client::HttpStore;
pub mod editor;
pub use editor::PollEditor;

#[cfg(any(test, feature = "mock_collaborators"))]
pub mod mock;

pub mod utils;

//! Raw jCal (RFC 7265) data, as exchanged with the server

mod property;
pub use property::JcalProperty;
mod component;
pub use component::{new_calendar, JcalComponent};

//! Support for library configuration options

use std::sync::{Arc, Mutex};
use once_cell::sync::Lazy;

/// Part of the ProdID string that describes the organization (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
/// Feel free to override it when initing this library.
pub static ORG_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("My organization".to_string())));

/// Part of the ProdID string that describes the product name (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
/// Feel free to override it when initing this library.
pub static PRODUCT_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("JcalPoll".to_string())));

/// Media type used to exchange jCal resources with the server
pub const CALENDAR_JSON: &str = "application/calendar+json";

/// The PRODID written into calendars created by this crate
pub fn default_prod_id() -> String {
    format!("-//{}//{}//EN", read(&ORG_NAME), read(&PRODUCT_NAME))
}

fn read(value: &Mutex<String>) -> String {
    match value.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_id() {
        let prod_id = default_prod_id();
        assert!(prod_id.starts_with("-//"));
        assert!(prod_id.ends_with("//EN"));
        assert!(prod_id.contains(&*read(&PRODUCT_NAME)));
    }
}

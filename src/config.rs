//! Support for library configuration options

use std::sync::{Arc, Mutex};
use once_cell::sync::Lazy;

/// Part of the ProdID string that describes the organization (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
/// Feel free to override it when initing this library.
pub static ORG_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("My organization".to_string())));

/// Part of the ProdID string that describes the product name (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
/// Feel free to override it when initing this library.
pub static PRODUCT_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Rendezvous".to_string())));

/// How far past the requested start the slot finder is allowed to look, in days
pub const DEFAULT_SLOT_HORIZON_DAYS: i64 = 365;

/// Local edits made within this many seconds are coalesced into a single free/busy publish
pub const DEFAULT_PUBLISH_DELAY_SECS: i64 = 5;

/// A failed free/busy publish is not retried sooner than this many seconds
pub const DEFAULT_PUBLISH_RETRY_SECS: i64 = 5 * 60;

/// Extension of the files stored by the [`FreeBusyCache`](crate::cache::FreeBusyCache)
pub const FREEBUSY_FILE_EXTENSION: &str = "ifb";

/// Returns the PRODID string emitted in every generated iCalendar payload
pub fn prod_id() -> String {
    let org = ORG_NAME.lock().map(|s| s.clone()).unwrap_or_default();
    let product = PRODUCT_NAME.lock().map(|s| s.clone()).unwrap_or_default();
    format!("-//{}//{}//EN", org, product)
}

//! Keep a remote data slot in sync with the query string of the current URL.
//!
//! The pieces, bottom-up:
//!
//! - [`query`]: query-string decoding, encoding and change detection
//! - [`history`]: the navigator the URL lives in
//! - [`http`] and [`repository`]: how data for a location is loaded and saved
//! - [`sync`]: the controller that ties the slot, the URL and the port together

pub mod config;
pub mod history;
pub mod http;
pub mod json;
pub mod query;
pub mod repository;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

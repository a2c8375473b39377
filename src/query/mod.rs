//! URL query handling: parsing, serialization and change detection.

mod codec;
mod diff;

pub use codec::{decode, encode, url_components, url_query, Location, QueryMap, UrlComponents};
pub use diff::should_refetch;

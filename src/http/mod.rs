//! HTTP transport adapters.

mod client;
mod relative;

pub use client::{HttpClient, Method, ReqwestClient, RequestConfig};
pub use relative::RelativeHttpClient;

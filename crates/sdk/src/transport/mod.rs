//! Transport layer for the toolmesh SDK.

pub mod http;
pub mod peer;

pub use http::HttpTransport;
pub use peer::HttpPeerTransport;

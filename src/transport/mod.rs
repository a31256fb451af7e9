//! Transport listeners
//!
//! Thin collaborators around the dispatcher: each decodes requests, hands
//! them to the single dispatch entry point, and delivers exactly one response
//! per request id, in whatever order calls complete.

pub mod http;
pub mod stdio;

pub use http::HttpServer;
pub use stdio::StdioServer;

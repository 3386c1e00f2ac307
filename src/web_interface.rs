//! HTTP API.
//!
//! Every endpoint except `/newchat` reads the session token from the
//! `session_id` cookie. JSON endpoints answer with the `{code, msg, res_data}`
//! envelope; `/stream_chat` answers with a raw chunked text body.

pub mod routes;
pub mod types;
pub mod web_server;

pub use types::ApiEnvelope;
pub use web_server::{AppState, WebServer};

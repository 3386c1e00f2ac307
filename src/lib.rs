pub mod chat_stream;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod recommendation;
pub mod retrieval;
pub mod session_management;
pub mod storage;
pub mod summarizer;
pub mod upstream;
pub mod web_interface;

#[cfg(test)]
mod test_support;

pub use controller::Controller;

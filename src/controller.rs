//! Process wiring: configuration in, running HTTP service out.

pub mod controller_handler;

pub use controller_handler::Controller;

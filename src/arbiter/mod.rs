//! External arbiter: an HTTP client that escalates divergent specialist
//! reports to a judging service, and the service itself.

pub mod client;
pub mod service;

pub use client::{send_to_arbiter, ArbiterClient};
pub use service::{arbiter_router, ArbiterState};

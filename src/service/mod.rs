//! HTTP request handlers for the greeter service.

pub mod greeting;

pub use greeting::send_greeting;

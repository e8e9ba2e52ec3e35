//! Core types and the reviewer assignment engine for the PR reviewer service.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement the traits in [`store`]; transports drive
//! [`ReviewService`].

pub mod cascade;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod pull_request;
pub mod selection;
pub mod service;
pub mod store;
pub mod team;

pub use error::{Error, ErrorKind, Result};
pub use service::ReviewService;

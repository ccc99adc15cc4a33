//! Core types and trait definitions for the cueme rendezvous store.
//!
//! This crate is deliberately free of database and I/O dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod content;
pub mod request;
pub mod response;
pub mod store;

pub use request::{NewRequest, Request, RequestStatus, WaitMode};
pub use response::{FileRef, InlineImage, NewFile, ResponseBody, ResponseRow};
pub use store::CueStore;

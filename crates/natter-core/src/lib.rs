//! Core types and trait definitions for natter threaded comments.
//!
//! This crate is deliberately free of database and CLI dependencies. Storage
//! backends implement [`store::CommentStore`]; callers go through
//! [`service::CommentService`] and receive [`thread::Thread`] forests.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod author;
pub mod comment;
pub mod error;
pub mod memory;
pub mod service;
pub mod store;
pub mod thread;

pub use error::{Error, Result};

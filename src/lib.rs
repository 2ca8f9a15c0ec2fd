//! Gmail Counter - unread mail badge
//!
//! This crate polls a single account's unread-mail Atom feed and mirrors the
//! count on a toolbar badge, raising a sign-in prompt once the session is lost.

pub mod config;
pub mod error;
pub mod feed;
pub mod host;
pub mod poller;
pub mod routes;
pub mod toolbar;

//! GraphQL-over-HTTP client.
//!
//! [`GraphQlClient`] owns the transport and envelope handling; endpoint
//! groups live in [`navigation`], [`session`], and [`auth`].

pub mod auth;
pub mod client;
pub mod models;
pub mod navigation;
pub mod operations;
pub mod session;

pub use client::{GraphQlClient, SESSION_EXPIRED_CODES};

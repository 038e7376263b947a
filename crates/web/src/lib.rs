//! Netkeeper web layer
//!
//! Read-only status API plus the manual-connect submit endpoint. This crate
//! never drives the radio itself: it reads the status snapshot and hands
//! requests to the supervisor through the [`Control`] seam.

mod server;

pub use server::{router, serve, Control};

//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence calls so route
//! handlers stay focused on protocol translation and auth plumbing. The
//! registry is the only in-memory state; everything else lives behind
//! `ChatStore`.

pub mod auth;
pub mod chat;
pub mod registry;

//! Review learning REST server.

pub mod config;
pub mod correlation;
pub mod error;
pub mod handlers;
pub mod requests;
pub mod router;
pub mod state;

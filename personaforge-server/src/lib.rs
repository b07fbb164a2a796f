//! # PersonaForge Server
//!
//! HTTP surface over [`personaforge_core`]: turns a persona's reply into
//! speech and then into a lip-synced video, either waiting for the render or
//! handing back a job ticket to poll.
//!
//! Routes live under `/api/v1` (see [`routes`]); `/ping` and `/health` sit at
//! the root.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

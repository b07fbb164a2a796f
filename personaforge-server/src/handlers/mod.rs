pub mod health;
pub mod idle;
pub mod jobs;
pub(crate) mod reply;
pub mod talk;
pub mod videos;

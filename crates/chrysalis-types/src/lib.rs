pub mod api;
pub mod events;
pub mod models;
pub mod progression;
pub mod voting;

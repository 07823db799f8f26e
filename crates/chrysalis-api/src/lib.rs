pub mod achievements;
pub mod auth;
pub mod error;
pub mod meadows;
pub mod middleware;
pub mod proposals;
pub mod resources;
pub mod stages;

pub mod admin;
pub mod health;
pub mod media;
pub mod resources;
pub mod solve;
pub mod strategies;

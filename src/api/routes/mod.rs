//! API route handlers

pub mod health;
pub mod live;
pub mod refresh;
pub mod topology;

pub mod analytics;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod profile;
pub mod users;

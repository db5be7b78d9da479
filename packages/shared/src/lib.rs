pub mod auth;
pub mod config;
pub mod models;
pub mod repositories;

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod payments;
pub mod reservations;
pub mod routes;
pub mod scheduling;
pub mod state;
pub mod utils;

pub mod api;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod checkout;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod profile_cache;
pub mod role;
pub mod routes;
pub mod schema;
pub mod stats;
pub mod status;
pub mod store;
pub mod swagger;
pub mod tracking;

#[cfg(test)]
mod test_helpers;

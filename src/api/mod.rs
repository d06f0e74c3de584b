//! API module which contains all the routes for the application.

pub mod route;
pub mod schema;

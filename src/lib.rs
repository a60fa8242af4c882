//! Product-alternatives API: users post queries, others answer them with
//! recommendations. Authentication uses a signed session cookie.

pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod query_service;
pub mod recommendation_service;
pub mod route;
pub mod state;
pub mod token;

pub mod api;
pub mod config;
pub mod http;
mod orm;
pub mod short_id;
pub mod url_repo;
pub mod url_service;

// Library for tests to access modules

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod history;
pub mod models;
pub mod rate;
pub mod routes;
pub mod scheduler;
pub mod sink;
pub mod source;

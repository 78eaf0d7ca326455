// Library for tests to access modules

pub mod aligner;
pub mod config;
pub mod error;
pub mod hub;
pub mod models;
pub mod mqtt;
pub mod reconciler;
pub mod routes;
pub mod topics;
pub mod version;

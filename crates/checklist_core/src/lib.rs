pub mod auth;
pub mod error;
pub mod model;
pub mod notify;
pub mod prefs;
pub mod scheduler;
pub mod session;
pub mod store;

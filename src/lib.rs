pub mod calendar;
pub mod config;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod plan;
pub mod refresh;
pub mod session;
pub mod store;

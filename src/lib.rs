pub mod clean;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod load;
pub mod output;
pub mod pipeline;
pub mod secrets;
pub mod store;

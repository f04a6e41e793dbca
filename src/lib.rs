pub mod apis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod pacer;
pub mod pipeline;
pub mod processor;
pub mod types;

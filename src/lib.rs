pub mod cleaner;
pub mod cli;
pub mod config;
pub mod export;
pub mod import;
pub mod pipeline;
pub mod queries;
pub mod report;
pub mod store;
pub mod util;

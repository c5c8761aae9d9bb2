pub mod app;
pub mod catalog;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod join;
pub mod loader;
pub mod output;
pub mod release;
pub mod report;
pub mod schema;
pub mod spec;
pub mod table;
pub mod validate;

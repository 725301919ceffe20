pub mod config;
pub mod labels;

pub mod api;
pub mod cli;
pub mod config;
pub mod documents;
pub mod history;
pub mod humanize;
pub mod jobs;
pub mod observability;
pub mod worker;

pub mod config;
pub mod db;
pub mod handlers;
pub mod knowledge;
pub mod models;
pub mod pipeline;
pub mod scheduling;
pub mod seed;

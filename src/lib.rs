#[macro_use]
extern crate tracing;

pub mod aws;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod container_registry;
pub mod dynamo_db;
pub mod export;
pub mod extraction;
pub mod logger;
pub mod models;
pub mod object_storage;
pub mod redshift;
pub mod release;
pub mod runtime;
pub mod server;

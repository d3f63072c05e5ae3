mod config;
mod server;

pub mod command;
pub mod docker;

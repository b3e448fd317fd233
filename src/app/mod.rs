pub mod backend;
pub mod commands;
pub mod state;

// src/commands/mod.rs
//! Command handlers for the portconv CLI

mod generate;

pub use generate::cmd_generate;

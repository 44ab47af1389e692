pub mod app;
pub mod chat;
pub mod commands;
pub mod config;
pub mod console;
pub mod consts;
pub mod exceptions;
pub mod fs;
pub mod history;
pub mod keys;
pub mod llm;
pub mod logging;
pub mod models;
pub mod t2i;
pub mod ui;
pub mod utils;

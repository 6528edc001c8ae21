//! Lightweight typing activity tracker. Listens to key presses system-wide, groups them into
//! sessions separated by pauses, and keeps each session on disk as a JSON file named after the
//! time it started.

pub mod cli;
pub mod key_api;
pub mod tracker;
pub mod utils;

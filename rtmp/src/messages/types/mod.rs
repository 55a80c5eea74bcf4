//! Byte layouts of individual message bodies

pub mod aggregate;
pub mod command;
pub mod control;
pub mod data;
pub mod user_control;

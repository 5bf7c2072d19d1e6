pub mod access;
pub mod cp;
pub mod op;
pub mod types;

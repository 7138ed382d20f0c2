//! Small shared helpers

pub mod crypto;
pub mod file;

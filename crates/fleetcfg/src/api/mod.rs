//! API route handlers

pub mod error;
pub mod identity;
pub mod profiles;
pub mod states;
pub mod system;

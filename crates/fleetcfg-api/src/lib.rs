//! fleetcfg-api: Shared domain and wire types
//!
//! Contains the profile record and its state-map view, host records,
//! message-queue payloads and HTTP request/response bodies used across
//! the store, core and daemon crates.

pub mod events;
pub mod host;
pub mod profile;
pub mod requests;
pub mod responses;

pub use host::{Host, SystemProfile};
pub use profile::{Profile, StateMap};

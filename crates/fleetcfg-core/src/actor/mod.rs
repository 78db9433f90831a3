//! Actor implementations

pub mod dispatch;

pub use dispatch::{DispatchActor, DispatchActorArgs};

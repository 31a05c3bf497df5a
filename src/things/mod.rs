//! Entity store contract consumed by the rest of the core

pub mod store;

pub use store::{Thing, ThingClass, ThingData, ThingStore};

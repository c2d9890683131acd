//! Domain models for the IOL catalog system.

mod lens;
mod patient;
mod rule;

pub use lens::*;
pub use patient::*;
pub use rule::*;

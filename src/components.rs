//! Editor building blocks that carry state between events.

pub mod colors;
pub mod history;
pub mod tools;

pub mod collections;
pub mod common;
pub mod completions;
pub mod inspect;
pub mod migrate;
pub mod probe;

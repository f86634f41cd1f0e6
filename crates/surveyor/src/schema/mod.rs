//! Upload schema bridge implementations.

mod memory;

pub use memory::InMemorySchemaBridge;

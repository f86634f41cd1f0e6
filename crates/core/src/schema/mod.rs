//! Interface to the service that derives upload schemas from published
//! surveys.

mod error;
mod traits;

pub use error::SchemaError;
pub use traits::SchemaBridge;

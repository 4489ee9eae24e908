// Chain data model and the standalone chain validator.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;

//! Administrative jobs run on demand, from the command line or an admin endpoint.

mod recalculate;
mod remap;

pub use recalculate::*;
pub use remap::*;

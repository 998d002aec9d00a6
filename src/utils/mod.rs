mod helpers;
mod logging;

pub use helpers::*;
pub use logging::*;

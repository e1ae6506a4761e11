pub mod catalog;
pub mod features;
pub mod prediction;

pub use catalog::*;
pub use features::*;
pub use prediction::*;

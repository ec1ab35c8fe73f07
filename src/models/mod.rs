pub mod bucket;
pub mod common;
pub mod intake;
pub mod lead;
pub mod verification;

pub use bucket::*;
pub use common::*;
pub use intake::*;
pub use lead::*;
pub use verification::*;

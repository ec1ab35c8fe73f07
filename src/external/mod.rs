pub mod lead_store;
pub mod turnstile;
pub mod twilio;
pub mod verification;

pub use lead_store::*;
pub use turnstile::*;
pub use twilio::*;
pub use verification::*;

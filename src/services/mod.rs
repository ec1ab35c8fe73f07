pub mod intake_service;
pub mod leads_view_service;
pub mod session_registry;

pub use intake_service::*;
pub use leads_view_service::*;
pub use session_registry::*;

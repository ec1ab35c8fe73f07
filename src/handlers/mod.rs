pub mod admin;
pub mod intake;

pub use admin::admin_config;
pub use intake::intake_config;

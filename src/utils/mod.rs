pub mod call_policy;
pub mod code_generator;
pub mod email;
pub mod phone;

pub use call_policy::CallPolicy;
pub use code_generator::generate_six_digit_code;
pub use email::*;
pub use phone::*;

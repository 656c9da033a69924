mod research;
mod session_validator;
mod utils;

pub use utils::test_utils;

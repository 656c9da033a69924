pub mod monitoring;
pub mod municipalities;
pub mod projects;
pub mod research;
pub mod users;

pub use monitoring::*;
pub use municipalities::*;
pub use projects::*;
pub use research::*;
pub use users::*;

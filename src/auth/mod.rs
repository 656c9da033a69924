pub mod authentication;
pub mod context;
pub mod guard;
pub mod session;
pub mod token;
pub mod user;
pub mod validator;

pub use authentication::*;
pub use context::*;
pub use guard::*;
pub use session::*;
pub use token::*;
pub use user::*;
pub use self::validator::*;

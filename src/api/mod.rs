pub mod auth;
pub mod municipalities;
pub mod projects;
pub mod public;
pub mod research;

pub use auth::*;
pub use municipalities::*;
pub use projects::*;
pub use public::*;
pub use research::*;

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

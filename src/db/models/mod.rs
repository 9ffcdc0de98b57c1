//! Database models split into separate files.

pub mod user;

pub use self::user::*;

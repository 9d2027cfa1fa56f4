//! Configuration types for calsync.

mod account;

pub use account::AccountContext;

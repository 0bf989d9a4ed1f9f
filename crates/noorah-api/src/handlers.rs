//! Request handlers.

pub mod guardian;
pub mod health;
pub mod mfa;

pub use guardian::*;
pub use health::*;
pub use mfa::*;

//! Credential pair, redacted secrets, and cached access tokens.

pub mod credentials;
pub mod secret;
pub mod token;

pub use credentials::*;
pub use secret::*;
pub use token::*;

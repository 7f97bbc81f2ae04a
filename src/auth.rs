//! Auth-domain identifiers, token secrets, and access-token claims.

pub mod claims;
pub mod id;
pub mod secret;

pub use claims::*;
pub use id::*;
pub use secret::*;

//! Request identity: user identifiers, lookup collaborators, and the credential resolver chain.

pub mod id;
pub mod resolver;
pub mod user;

pub use id::*;
pub use resolver::*;
pub use user::*;

//! Types shared between the filedrop server and any alternative storage
//! backends: caller identities, stored-filename derivation, and the
//! `FileStore` trait.

pub mod backend;
pub mod identity;
pub mod naming;

pub use backend::{FileStore, StoreError};
pub use identity::Identity;

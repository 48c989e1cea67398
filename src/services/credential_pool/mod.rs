//! Credential Pool Module
//!
//! Ordered, read-only pools of interchangeable API keys. The fallback
//! dispatcher walks a pool in insertion order; nothing here tracks health or
//! mutates after load, so a pool can be shared freely between requests.
//!
//! # Example
//! ```ignore
//! use creator_hub::services::credential_pool::CredentialPool;
//!
//! let pool = CredentialPool::load("gemini", ["key1", "key2"])?;
//! for cred in pool.iterate() {
//!     println!("{}", cred.fingerprint());
//! }
//! ```

mod credential;
mod pool;

pub use credential::{Credential, SecretString};
pub use pool::{collect_keys, split_keys, CredentialPool};

//! Shared data model for credscan.
//!
//! Holds the [`CredentialRecord`] produced by an extraction, the enums that
//! describe which side and layout of the credential was scanned, the
//! [`ErrorKind`] taxonomy reported to callers, and the capability descriptors
//! returned by the service and the recognition engine.
//!
//! Nothing in this crate performs I/O or depends on an async runtime.

pub mod error;
pub mod info;
pub mod raw;
pub mod record;
pub mod wire;

pub use error::{ErrorKind, WireError};
pub use info::{EngineInfo, ServiceInfo};
pub use raw::RawFields;
pub use record::{BackFields, CredentialRecord, CredentialType, DocumentSide, FrontFields};

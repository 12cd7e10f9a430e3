//! Dataset model for datasync.
//!
//! Defines the contract between a dataset type and the engine:
//! - [`DatasetDescriptor`]: static metadata of one dataset type (folder, priority, sync, arrays, cache)
//! - [`RecordCodec`]: maps one typed record to and from a generic JSON tree
//! - [`RecordValidator`]: decides whether a decoded record is admitted
//!
//! Codecs and validators are passed explicitly at registration time; nothing
//! is discovered at runtime.

mod codec;
mod descriptor;
mod validator;

pub use codec::{CodecError, JsonCodec, RecordCodec};
pub use descriptor::{DatasetDescriptor, DEFAULT_PRIORITY};
pub use validator::{AcceptAll, FnValidator, RecordValidator, ValidationOutcome};

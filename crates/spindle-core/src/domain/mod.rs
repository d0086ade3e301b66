//! Domain model (ids, values, task descriptors, job states, errors).

pub mod errors;
pub mod ids;
pub mod job;
pub mod state;
pub mod task;
pub mod value;

pub use self::errors::{ErrorKind, MemoError, ProviderError};
pub use self::ids::TaskId;
pub use self::job::{JobStatus, SUMMARY_ELISION_MARKER, SUMMARY_TRUNCATION_THRESHOLD};
pub use self::state::JobState;
pub use self::task::TaskDescriptor;
pub use self::value::{FunctionRef, MemoValue};

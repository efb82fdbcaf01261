pub mod meta;
pub mod record;

pub use meta::ErrorMeta;
pub use record::{ErrorRecord, NewErrorRecord, Severity};

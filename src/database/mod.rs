pub mod connection;
pub mod payment_store;

use mongodb::error::{ErrorKind, WriteFailure};

/// True when an insert bounced off a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

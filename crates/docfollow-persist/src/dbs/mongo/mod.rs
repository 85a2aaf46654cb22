pub mod client;
pub mod jobs;
pub mod models;
pub mod repositories;

pub use client::MongoPersistenceClient;
pub use jobs::MongoJobStore;

use bson::oid::ObjectId;
use mongodb::error::{ErrorKind, WriteFailure};

use crate::error::{PersistError, Result};

const DUPLICATE_KEY_CODE: i32 = 11000;

pub(crate) fn parse_object_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|e| PersistError::InvalidObjectId(format!("{}: {}", id, e)))
}

/// Map a unique-index violation to `Duplicate`, everything else to `Database`.
pub(crate) fn map_write_error(err: mongodb::error::Error, what: &str) -> PersistError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
        if write_error.code == DUPLICATE_KEY_CODE {
            return PersistError::Duplicate(what.to_string());
        }
    }
    PersistError::Database(err)
}

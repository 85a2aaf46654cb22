#[cfg(feature = "mongodb")]
pub mod builder;
pub mod dbs;
pub mod error;
pub mod job_store;
pub mod memory;
pub mod models;
pub mod trait_client;

pub use error::{PersistError, Result};
pub use job_store::JobStore;
pub use memory::{InMemoryJobStore, InMemoryPersistenceClient};
pub use models::{
    FollowupUpdate, JobKind, ReminderFilter, ReminderStats, ReminderUpdate, ScheduledJob,
};
pub use trait_client::PersistenceClient;

#[cfg(feature = "mongodb")]
pub use builder::PersistClientBuilder;
#[cfg(feature = "mongodb")]
pub use dbs::mongo::{MongoJobStore, MongoPersistenceClient};

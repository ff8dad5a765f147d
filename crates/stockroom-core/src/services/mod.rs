//! Services shared by every front end

mod catalog;
mod local_store;

pub use catalog::{Catalog, WriteOutcome};
pub use local_store::LocalStore;

pub mod context;
pub mod error;
pub mod repositories;
pub mod search;
pub mod sync;

pub use context::KeelContext;
pub use error::{OperationError, Result};
pub use repositories::{PackageMatch, Repositories};
pub use search::{SearchHit, SearchMode};
pub use sync::sync_repositories;

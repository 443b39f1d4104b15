//! Session-start health probe: never-blocking checks of vector-DB
//! connectivity, collection existence, index freshness, and VCS context.

pub mod probe;
pub mod result;
pub mod status;

pub use probe::{HealthProbe, find_project_root};
pub use result::SessionStartResult;
pub use status::CheckStatus;

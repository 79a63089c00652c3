//! Label names and values

/// Backend label key
pub const BACKEND: &str = "backend";

/// Outcome label key
pub const OUTCOME: &str = "outcome";

/// Error category label key
pub const ERROR: &str = "error";

/// Operation succeeded
pub const OUTCOME_SUCCESS: &str = "success";

/// Operation failed
pub const OUTCOME_FAILURE: &str = "failure";

/// Transaction committed
pub const TX_COMMITTED: &str = "committed";

/// Transaction rolled back after a failed statement
pub const TX_ROLLED_BACK: &str = "rolled_back";

/// Transaction could not be opened
pub const TX_BEGIN_FAILED: &str = "begin_failed";

/// Commit failed
pub const TX_COMMIT_FAILED: &str = "commit_failed";

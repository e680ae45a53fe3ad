pub mod fingerprint;
pub mod reconciler;
pub mod scheduler;
pub mod state;

pub use fingerprint::GroupFingerprint;
pub use reconciler::{Reconciler, DEFAULT_MAX_WORKERS};
pub use state::{GroupState, GroupStateStore};

pub mod stale_request_worker;
pub mod token_cleanup_worker;

pub use stale_request_worker::StaleRequestWorker;
pub use token_cleanup_worker::ReadingTokenCleanupWorker;

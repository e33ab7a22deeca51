pub mod app;
pub mod shutdown;

pub use app::{load_requests, Application};
pub use shutdown::ShutdownManager;

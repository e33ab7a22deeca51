pub mod analyzer;
pub mod observer;
pub mod runner;

pub use analyzer::*;
pub use observer::*;
pub use runner::*;

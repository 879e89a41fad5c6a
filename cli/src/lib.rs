pub mod commands;
pub mod context;
pub mod deployments;
pub mod driver;
pub mod interpreter;
pub mod logging;
pub mod repl;
pub mod scenario;

pub use context::CliContext;
pub use repl::readline;

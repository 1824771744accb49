pub mod action;
pub mod cancel;
pub mod config;
pub mod deck;
pub mod error;
pub mod executors;
pub mod history;
pub mod host;
pub mod params;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod result;
pub mod scene;
pub mod session;
pub mod snapshot;
pub mod state_stack;
pub mod types;
pub mod undo;
pub mod workbench;

pub use error::{Result, StagehandError};
pub use pipeline::{ExecuteOptions, Pipeline};
pub use registry::Registry;
pub use result::ExecutionResult;
pub use session::Session;
pub use types::ActionType;
pub use workbench::Workbench;

pub use lookout_core;

pub mod handlers;
mod supervisor;

pub use handlers::{register_builtin, SystemDataHandler, TcpHandler};
pub use supervisor::{ExecutionSupervisor, RunningPolicy, SupervisorStats};

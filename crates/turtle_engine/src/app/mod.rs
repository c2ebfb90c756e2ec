mod actor;
mod commands;
mod dispatcher;
mod inbox;
mod loop_runner;
mod math;
mod metrics;
mod pool;
mod symbols;

pub use actor::{Actor, MotionStatus, MotionTask, Transform};
pub use commands::{parse_command, Command};
pub use dispatcher::{CommandDispatcher, CommandError, DispatchEvent, DispatcherSettings};
pub use inbox::CommandSender;
pub use loop_runner::{run_headless, FixedTickDriver, LoopConfig};
pub use math::{Quat, Vec3};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use pool::{ActorHandle, ActorPool};
pub use symbols::SymbolTable;

pub mod app;
pub mod config;

pub use app::{
    parse_command, run_headless, Actor, ActorHandle, ActorPool, Command, CommandDispatcher,
    CommandError, CommandSender, DispatchEvent, DispatcherSettings, FixedTickDriver, LoopConfig,
    LoopMetricsSnapshot, MetricsHandle, MotionStatus, MotionTask, Quat, SymbolTable, Transform,
    Vec3,
};
pub use config::{
    ConfigError, TurtleConfig, CONFIG_PATH_ENV_VAR, MOVE_SPEED_ENV_VAR, POOL_CAPACITY_ENV_VAR,
    TARGET_TPS_ENV_VAR,
};

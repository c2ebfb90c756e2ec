use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::actor::MotionStatus;
use super::commands::{parse_command, Command};
use super::inbox::{CommandInbox, CommandSender};
use super::math::{Quat, Vec3};
use super::pool::{ActorHandle, ActorPool};
use super::symbols::SymbolTable;

const MAX_PENDING_EVENTS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unrecognized command '{raw}'")]
    Unrecognized { raw: String },
    #[error("invalid distance '{operand}' for actor '{actor_name}'")]
    InvalidDistance { actor_name: String, operand: String },
    #[error("unknown actor '{name}'")]
    UnknownActor { name: String },
    #[error("actor pool exhausted ({capacity} slots in use); cannot spawn '{name}'")]
    PoolExhausted { name: String, capacity: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Spawned {
        name: String,
        handle: ActorHandle,
        position: Vec3,
    },
    PlayIdle {
        name: String,
        handle: ActorHandle,
    },
    MoveStarted {
        name: String,
        distance: f32,
    },
    MoveStepped {
        name: String,
        position: Vec3,
    },
    MoveCompleted {
        name: String,
        position: Vec3,
    },
    PositionReadBack {
        var_name: String,
        position: Vec3,
    },
    Failed(CommandError),
}

impl DispatchEvent {
    /// Console line for events a user should see, `None` for per-tick noise.
    pub fn console_line(&self) -> Option<String> {
        match self {
            Self::PositionReadBack { var_name, position } => {
                Some(format!("{var_name}={position}"))
            }
            Self::Failed(error) => Some(format!("error: {error}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherSettings {
    pub pool_capacity: usize,
    pub move_speed: f32,
    pub spawn_position: Vec3,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            pool_capacity: 5,
            move_speed: 1.0,
            spawn_position: Vec3::ZERO,
        }
    }
}

#[derive(Debug)]
struct InFlightMove {
    handle: ActorHandle,
    actor_name: String,
    ticks: u32,
}

enum CommandProgress {
    Finished,
    Suspended(InFlightMove),
}

/// Single-consumer command scheduler.
///
/// Each [`tick`](Self::tick) either resumes the in-flight move or starts the
/// next queued line. Spawns, queries and failures finish within the tick that
/// starts them; a move keeps the dispatcher busy until its motion task
/// completes, so commands for other actors wait behind it.
#[derive(Debug)]
pub struct CommandDispatcher {
    inbox: CommandInbox,
    pool: ActorPool,
    symbols: SymbolTable,
    settings: DispatcherSettings,
    in_flight: Option<InFlightMove>,
    events: VecDeque<DispatchEvent>,
    commands_completed: u64,
    dropped_events: u64,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DispatcherSettings::default())
    }
}

impl CommandDispatcher {
    pub fn new(settings: DispatcherSettings) -> Self {
        Self {
            inbox: CommandInbox::default(),
            pool: ActorPool::preallocate(settings.pool_capacity),
            symbols: SymbolTable::new(),
            settings,
            in_flight: None,
            events: VecDeque::new(),
            commands_completed: 0,
            dropped_events: 0,
        }
    }

    pub fn sender(&self) -> CommandSender {
        self.inbox.sender()
    }

    pub fn enqueue(&self, line: impl Into<String>) -> bool {
        self.inbox.sender().submit(line)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.inbox.len()
    }

    pub fn is_idle(&self) -> bool {
        !self.is_busy() && self.pending_len() == 0
    }

    pub fn commands_completed(&self) -> u64 {
        self.commands_completed
    }

    /// Effects evicted from the undrained buffer since creation.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn pool(&self) -> &ActorPool {
        &self.pool
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn position(&self, actor_name: &str) -> Result<Vec3, CommandError> {
        self.symbols
            .actor(actor_name)
            .and_then(|handle| self.pool.get(handle))
            .map(|actor| actor.position())
            .ok_or_else(|| CommandError::UnknownActor {
                name: actor_name.to_string(),
            })
    }

    pub fn variable(&self, var_name: &str) -> Option<Vec3> {
        self.symbols.variable(var_name)
    }

    pub fn drain_events_into(&mut self, out: &mut Vec<DispatchEvent>) {
        out.extend(self.events.drain(..));
    }

    pub fn tick(&mut self, dt_seconds: f32) {
        if let Some(in_flight) = self.in_flight.take() {
            let progress = self.advance_move(in_flight, dt_seconds);
            self.apply_progress(progress);
            return;
        }

        let Some(line) = self.inbox.pop_front() else {
            return;
        };
        let command = parse_command(&line);
        debug!(line = line.as_str(), kind = command.kind(), "command_dequeued");
        let progress = self.execute(command, dt_seconds);
        self.apply_progress(progress);
    }

    /// Ticks until nothing is queued or in flight, or `max_ticks` is hit.
    /// Returns the number of ticks run.
    pub fn run_until_idle(&mut self, dt_seconds: f32, max_ticks: u32) -> u32 {
        let mut ticks = 0u32;
        while !self.is_idle() && ticks < max_ticks {
            self.tick(dt_seconds);
            ticks = ticks.saturating_add(1);
        }
        ticks
    }

    fn execute(&mut self, command: Command, dt_seconds: f32) -> CommandProgress {
        let kind = command.kind();
        let result = match command {
            Command::Spawn { name } => self.spawn(name),
            Command::PositionQuery {
                var_name,
                actor_name,
            } => self.query_position(var_name, &actor_name),
            Command::Move {
                actor_name,
                distance,
            } => self.start_move(actor_name, distance, dt_seconds),
            Command::MalformedMove {
                actor_name,
                operand,
            } => self.reject_malformed_move(actor_name, operand),
            Command::Unrecognized { raw } => Err(CommandError::Unrecognized { raw }),
        };

        match result {
            Ok(progress) => progress,
            Err(failure) => {
                error!(command = kind, error = %failure, "command_failed");
                self.push_event(DispatchEvent::Failed(failure));
                CommandProgress::Finished
            }
        }
    }

    fn apply_progress(&mut self, progress: CommandProgress) {
        match progress {
            CommandProgress::Finished => {
                self.commands_completed = self.commands_completed.saturating_add(1);
            }
            CommandProgress::Suspended(in_flight) => {
                self.in_flight = Some(in_flight);
            }
        }
    }

    fn spawn(&mut self, name: String) -> Result<CommandProgress, CommandError> {
        let Some(handle) = self.pool.acquire_free_slot() else {
            return Err(CommandError::PoolExhausted {
                name,
                capacity: self.pool.capacity(),
            });
        };

        let position = self.settings.spawn_position;
        if let Some(actor) = self.pool.get_mut(handle) {
            actor.initialize(name.as_str(), position, Quat::IDENTITY);
        }
        if let Some(previous) = self.symbols.bind_actor(name.as_str(), handle) {
            debug!(name = name.as_str(), previous_slot = previous.0, "actor_name_rebound");
        }
        info!(name = name.as_str(), slot = handle.0, "actor_spawned");

        self.push_event(DispatchEvent::Spawned {
            name: name.clone(),
            handle,
            position,
        });
        self.push_event(DispatchEvent::PlayIdle { name, handle });
        Ok(CommandProgress::Finished)
    }

    fn query_position(
        &mut self,
        var_name: String,
        actor_name: &str,
    ) -> Result<CommandProgress, CommandError> {
        let position = self.position(actor_name)?;
        self.symbols.set_variable(var_name.as_str(), position);
        info!(
            variable = var_name.as_str(),
            actor = actor_name,
            position = %position,
            "position_read_back"
        );
        self.push_event(DispatchEvent::PositionReadBack { var_name, position });
        Ok(CommandProgress::Finished)
    }

    fn start_move(
        &mut self,
        actor_name: String,
        distance: f32,
        dt_seconds: f32,
    ) -> Result<CommandProgress, CommandError> {
        let handle = self.resolve_actor(&actor_name)?;

        let move_speed = self.settings.move_speed;
        if let Some(actor) = self.pool.get_mut(handle) {
            actor.forward(distance, move_speed);
        }
        debug!(actor = actor_name.as_str(), distance, move_speed, "move_started");
        self.push_event(DispatchEvent::MoveStarted {
            name: actor_name.clone(),
            distance,
        });

        let in_flight = InFlightMove {
            handle,
            actor_name,
            ticks: 0,
        };
        Ok(self.advance_move(in_flight, dt_seconds))
    }

    /// The actor is resolved before the operand is blamed, so an unknown
    /// actor wins over a bad distance.
    fn reject_malformed_move(
        &self,
        actor_name: String,
        operand: String,
    ) -> Result<CommandProgress, CommandError> {
        self.resolve_actor(&actor_name)?;
        Err(CommandError::InvalidDistance {
            actor_name,
            operand,
        })
    }

    fn resolve_actor(&self, actor_name: &str) -> Result<ActorHandle, CommandError> {
        self.symbols
            .actor(actor_name)
            .filter(|handle| self.pool.get(*handle).is_some())
            .ok_or_else(|| CommandError::UnknownActor {
                name: actor_name.to_string(),
            })
    }

    fn advance_move(&mut self, mut in_flight: InFlightMove, dt_seconds: f32) -> CommandProgress {
        let Some(actor) = self.pool.get_mut(in_flight.handle) else {
            warn!(actor = in_flight.actor_name.as_str(), "move_target_released");
            return CommandProgress::Finished;
        };
        let status = actor.step_motion(dt_seconds);
        let position = actor.position();
        in_flight.ticks = in_flight.ticks.saturating_add(1);

        match status {
            MotionStatus::Running => {
                self.push_event(DispatchEvent::MoveStepped {
                    name: in_flight.actor_name.clone(),
                    position,
                });
                CommandProgress::Suspended(in_flight)
            }
            MotionStatus::Complete => {
                info!(
                    actor = in_flight.actor_name.as_str(),
                    ticks = in_flight.ticks,
                    position = %position,
                    "move_completed"
                );
                self.push_event(DispatchEvent::MoveCompleted {
                    name: in_flight.actor_name,
                    position,
                });
                CommandProgress::Finished
            }
        }
    }

    fn push_event(&mut self, event: DispatchEvent) {
        if self.events.len() == MAX_PENDING_EVENTS {
            self.events.pop_front();
            if self.dropped_events == 0 {
                warn!(
                    max_pending_events = MAX_PENDING_EVENTS,
                    "dispatch_events_evicted"
                );
            }
            self.dropped_events = self.dropped_events.saturating_add(1);
        }
        self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.1;

    fn dispatcher_with(pool_capacity: usize, move_speed: f32) -> CommandDispatcher {
        CommandDispatcher::new(DispatcherSettings {
            pool_capacity,
            move_speed,
            spawn_position: Vec3::ZERO,
        })
    }

    fn drain(dispatcher: &mut CommandDispatcher) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        dispatcher.drain_events_into(&mut events);
        events
    }

    fn failures(events: &[DispatchEvent]) -> Vec<CommandError> {
        events
            .iter()
            .filter_map(|event| match event {
                DispatchEvent::Failed(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn spawn_then_query_reads_spawn_origin() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("a=A.position()");

        dispatcher.tick(DT);
        dispatcher.tick(DT);

        assert_eq!(dispatcher.variable("a"), Some(Vec3::ZERO));
        let lines: Vec<String> = drain(&mut dispatcher)
            .iter()
            .filter_map(DispatchEvent::console_line)
            .collect();
        assert_eq!(lines, vec!["a=(0.00,0.00,0.00)"]);
    }

    #[test]
    fn spawn_emits_idle_animation_effect() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.tick(DT);

        let events = drain(&mut dispatcher);
        assert_eq!(
            events,
            vec![
                DispatchEvent::Spawned {
                    name: "A".to_string(),
                    handle: ActorHandle(0),
                    position: Vec3::ZERO,
                },
                DispatchEvent::PlayIdle {
                    name: "A".to_string(),
                    handle: ActorHandle(0),
                },
            ]
        );
        assert!(!dispatcher.pool().get(ActorHandle(0)).expect("actor").is_moving());
    }

    #[test]
    fn one_command_starts_per_tick() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("B=Turtle()");

        dispatcher.tick(DT);

        assert!(dispatcher.position("A").is_ok());
        assert!(dispatcher.position("B").is_err());
        assert_eq!(dispatcher.pending_len(), 1);
    }

    #[test]
    fn spawning_past_capacity_reports_pool_exhausted() {
        let mut dispatcher = dispatcher_with(2, 2.0);
        for name in ["A", "B", "C"] {
            dispatcher.enqueue(format!("{name}=Turtle()"));
        }

        dispatcher.run_until_idle(DT, 10);

        assert!(dispatcher.position("A").is_ok());
        assert!(dispatcher.position("B").is_ok());
        assert_eq!(dispatcher.symbols().actor("C"), None);
        assert_eq!(
            failures(&drain(&mut dispatcher)),
            vec![CommandError::PoolExhausted {
                name: "C".to_string(),
                capacity: 2,
            }]
        );
        assert_eq!(dispatcher.pool().capacity(), 2);
    }

    #[test]
    fn respawning_same_name_rebinds_to_new_slot() {
        let mut dispatcher = dispatcher_with(3, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("A.fd(1)");
        dispatcher.enqueue("A=Turtle()");

        dispatcher.run_until_idle(DT, 100);

        assert_eq!(dispatcher.symbols().actor("A"), Some(ActorHandle(1)));
        assert_eq!(dispatcher.position("A"), Ok(Vec3::ZERO));
        assert_eq!(dispatcher.pool().active_count(), 2);
    }

    #[test]
    fn move_holds_dispatcher_until_motion_completes() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("B=Turtle()");
        dispatcher.enqueue("A.fd(5)");
        dispatcher.enqueue("B.fd(3)");

        dispatcher.tick(DT);
        dispatcher.tick(DT);

        let mut ticks_for_a = 0;
        loop {
            dispatcher.tick(DT);
            ticks_for_a += 1;
            assert_eq!(dispatcher.position("B"), Ok(Vec3::ZERO));
            if !dispatcher.is_busy() {
                break;
            }
            assert!(ticks_for_a < 1_000, "move never completed");
        }

        assert!(dispatcher.position("A").expect("A").z >= 5.0 - 1e-4);
        assert_eq!(dispatcher.pending_len(), 1);

        dispatcher.tick(DT);
        assert!(dispatcher.position("B").expect("B").z > 0.0);
    }

    #[test]
    fn move_integrates_fixed_steps_with_bounded_overshoot() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("A.forward(1.0)");
        dispatcher.tick(DT);
        drain(&mut dispatcher);

        dispatcher.tick(DT);
        assert!((dispatcher.position("A").expect("A").z - 0.2).abs() < 1e-5);

        dispatcher.run_until_idle(DT, 100);
        let z = dispatcher.position("A").expect("A").z;
        assert!(z >= 1.0 - 1e-5, "z = {z}");
        assert!(z <= 1.2 + 1e-5, "z = {z}");

        let events = drain(&mut dispatcher);
        assert!(matches!(
            events.last(),
            Some(DispatchEvent::MoveCompleted { name, .. }) if name == "A"
        ));
    }

    #[test]
    fn negative_move_goes_backward() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("A.fd(-1)");

        dispatcher.run_until_idle(DT, 100);

        let position = dispatcher.position("A").expect("A");
        assert!(position.z <= -1.0 + 1e-5);
        assert!(position.z >= -1.2 - 1e-5);
    }

    #[test]
    fn query_mid_motion_sees_partial_progress() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("A.fd(1)");
        dispatcher.tick(DT);
        dispatcher.tick(DT);
        dispatcher.tick(DT);

        let z = dispatcher.position("A").expect("A").z;
        assert!((z - 0.4).abs() < 1e-5);
        assert!(dispatcher.is_busy());
    }

    #[test]
    fn unknown_actor_is_reported_and_does_not_block() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("X.fd(1)");
        dispatcher.enqueue("A=Turtle()");

        dispatcher.tick(DT);
        assert!(!dispatcher.is_busy());
        dispatcher.tick(DT);

        assert!(dispatcher.position("A").is_ok());
        assert_eq!(
            failures(&drain(&mut dispatcher)),
            vec![CommandError::UnknownActor {
                name: "X".to_string()
            }]
        );
    }

    #[test]
    fn query_for_unknown_actor_leaves_variable_unset() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("a=Ghost.position()");

        dispatcher.tick(DT);

        assert_eq!(dispatcher.variable("a"), None);
        assert_eq!(
            failures(&drain(&mut dispatcher)),
            vec![CommandError::UnknownActor {
                name: "Ghost".to_string()
            }]
        );
    }

    #[test]
    fn unrecognized_line_is_dropped_and_next_runs_on_following_tick() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("foobar");
        dispatcher.enqueue("A=Turtle()");

        dispatcher.tick(DT);
        assert_eq!(
            failures(&drain(&mut dispatcher)),
            vec![CommandError::Unrecognized {
                raw: "foobar".to_string()
            }]
        );
        assert!(dispatcher.position("A").is_err());

        dispatcher.tick(DT);
        assert!(dispatcher.position("A").is_ok());
    }

    #[test]
    fn malformed_distance_does_not_start_motion() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("A.fd(far)");
        dispatcher.tick(DT);
        drain(&mut dispatcher);

        dispatcher.tick(DT);

        assert!(!dispatcher.is_busy());
        assert_eq!(dispatcher.position("A"), Ok(Vec3::ZERO));
        let events = drain(&mut dispatcher);
        assert_eq!(
            events,
            vec![DispatchEvent::Failed(CommandError::InvalidDistance {
                actor_name: "A".to_string(),
                operand: "far".to_string(),
            })]
        );
        assert_eq!(
            events[0].console_line().as_deref(),
            Some("error: invalid distance 'far' for actor 'A'")
        );
    }

    #[test]
    fn unknown_actor_is_reported_before_malformed_distance() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("X.fd(abc)");

        dispatcher.tick(DT);

        assert_eq!(
            drain(&mut dispatcher),
            vec![DispatchEvent::Failed(CommandError::UnknownActor {
                name: "X".to_string(),
            })]
        );
        assert_eq!(dispatcher.commands_completed(), 1);
    }

    #[test]
    fn undrained_effects_are_evicted_and_counted() {
        let mut dispatcher = dispatcher_with(5, 1.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("Z.fd(1)");
        dispatcher.enqueue("A.fd(2000)");

        dispatcher.run_until_idle(1.0, 5000);
        let events = drain(&mut dispatcher);

        assert!(dispatcher.is_idle());
        assert_eq!(events.len(), MAX_PENDING_EVENTS);
        assert!(dispatcher.dropped_events() > 0);
        assert_eq!(
            dispatcher.dropped_events() + MAX_PENDING_EVENTS as u64,
            2 + 1 + 1 + 1999 + 1
        );
        assert!(matches!(
            events.last(),
            Some(DispatchEvent::MoveCompleted { .. })
        ));
    }

    #[test]
    fn empty_lines_are_not_queued() {
        let dispatcher = dispatcher_with(5, 2.0);

        assert!(!dispatcher.enqueue(""));
        assert!(!dispatcher.enqueue("   "));
        assert_eq!(dispatcher.pending_len(), 0);
        assert!(dispatcher.is_idle());
    }

    #[test]
    fn zero_distance_move_finishes_in_the_starting_tick() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        dispatcher.enqueue("A=Turtle()");
        dispatcher.enqueue("A.fd(0)");
        dispatcher.tick(DT);

        dispatcher.tick(DT);

        assert!(!dispatcher.is_busy());
        assert_eq!(dispatcher.position("A"), Ok(Vec3::ZERO));
        assert_eq!(dispatcher.commands_completed(), 2);
    }

    #[test]
    fn sender_from_another_thread_feeds_the_queue() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        let sender = dispatcher.sender();
        std::thread::spawn(move || {
            sender.submit("A=Turtle()");
            sender.submit("a=A.position()");
        })
        .join()
        .expect("producer thread");

        dispatcher.run_until_idle(DT, 10);

        assert_eq!(dispatcher.variable("a"), Some(Vec3::ZERO));
    }

    #[test]
    fn spawn_uses_configured_origin() {
        let mut dispatcher = CommandDispatcher::new(DispatcherSettings {
            spawn_position: Vec3::new(1.0, 2.0, 3.0),
            ..DispatcherSettings::default()
        });
        dispatcher.enqueue("A=Turtle()");
        dispatcher.tick(DT);

        assert_eq!(dispatcher.position("A"), Ok(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn event_buffer_is_bounded() {
        let mut dispatcher = dispatcher_with(5, 2.0);
        for _ in 0..(MAX_PENDING_EVENTS + 10) {
            dispatcher.enqueue("foobar");
        }
        dispatcher.run_until_idle(DT, (MAX_PENDING_EVENTS + 20) as u32);

        assert_eq!(drain(&mut dispatcher).len(), MAX_PENDING_EVENTS);
    }
}

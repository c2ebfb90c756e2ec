use super::math::{Quat, Vec3};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn translate_world(&mut self, delta: Vec3) {
        self.position += delta;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStatus {
    Running,
    Complete,
}

/// Fixed-speed forward motion, resumed once per tick.
///
/// Each step advances `move_speed * dt` along the transform's forward axis as
/// it is at that step, so a rotation applied mid-motion bends the path. The
/// last step is not clamped and may overshoot the requested distance by at
/// most one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTask {
    remaining: f32,
    sign: f32,
    move_speed: f32,
}

impl MotionTask {
    pub fn new(distance: f32, move_speed: f32) -> Self {
        let sign = if distance < 0.0 { -1.0 } else { 1.0 };
        Self {
            remaining: distance.abs(),
            sign,
            move_speed,
        }
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn step(&mut self, transform: &mut Transform, dt_seconds: f32) -> MotionStatus {
        if self.is_complete() {
            return MotionStatus::Complete;
        }

        let step = self.move_speed * dt_seconds;
        let direction = transform.rotation.forward() * self.sign;
        transform.translate_world(direction * step);
        self.remaining -= step;

        if self.is_complete() {
            MotionStatus::Complete
        } else {
            MotionStatus::Running
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Actor {
    name: String,
    transform: Transform,
    active: bool,
    motion: Option<MotionTask>,
}

impl Actor {
    pub(crate) fn inactive() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, name: impl Into<String>, position: Vec3, rotation: Quat) {
        self.name = name.into();
        self.transform = Transform { position, rotation };
        self.motion = None;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.motion = None;
        }
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    pub fn forward(&mut self, distance: f32, move_speed: f32) {
        self.motion = Some(MotionTask::new(distance, move_speed));
    }

    /// Advances the current motion by one tick. Returns `Complete` when no
    /// motion is pending.
    pub fn step_motion(&mut self, dt_seconds: f32) -> MotionStatus {
        let Some(task) = self.motion.as_mut() else {
            return MotionStatus::Complete;
        };
        let status = task.step(&mut self.transform, dt_seconds);
        if status == MotionStatus::Complete {
            self.motion = None;
        }
        status
    }
}

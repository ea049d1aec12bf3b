//! Replay-time controller.
//!
//! [`Playback`] only tracks *where* in recorded time the fleet is being
//! shown and how fast that point moves. The engine turns each change of
//! [`replay_time`](Playback::replay_time) into a registry seek plus
//! replay.

/// Playback rate multiplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackSpeed {
    /// Half speed.
    Slow,
    /// Real time.
    #[default]
    Normal,
    /// Double speed.
    Fast,
}

impl PlaybackSpeed {
    /// Seconds of recorded time per second of host time.
    pub fn factor(self) -> f64 {
        match self {
            Self::Slow => 0.5,
            Self::Normal => 1.0,
            Self::Fast => 2.0,
        }
    }
}

/// Which way recorded time moves while playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackDirection {
    /// Towards later entries.
    #[default]
    Forward,
    /// Towards earlier entries.
    Reverse,
}

/// Current replay position, rate and direction.
#[derive(Clone, Debug, PartialEq)]
pub struct Playback {
    replay_time: f64,
    speed: PlaybackSpeed,
    direction: PlaybackDirection,
    playing: bool,
    jump_step: f64,
}

impl Playback {
    /// Stopped at time zero; jumps move by `jump_step` seconds.
    pub fn new(jump_step: f64) -> Self {
        Self {
            replay_time: 0.0,
            speed: PlaybackSpeed::default(),
            direction: PlaybackDirection::default(),
            playing: false,
            jump_step,
        }
    }

    /// Start playing from `from`.
    pub fn play(&mut self, from: f64) {
        self.replay_time = from;
        self.playing = true;
    }

    /// Stop playing; the position is kept.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Whether time is advancing on each tick.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Advance by `dt` host seconds.
    ///
    /// Returns the new replay time while playing, `None` when stopped.
    /// Negative or non-finite `dt` counts as zero.
    pub fn advance(&mut self, dt: f64) -> Option<f64> {
        if !self.playing {
            return None;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.replay_time += self.signed(dt * self.speed.factor());
        Some(self.replay_time)
    }

    /// Move one jump step forward. Works whether or not playing.
    pub fn jump_forward(&mut self) -> f64 {
        self.replay_time += self.jump_step;
        self.replay_time
    }

    /// Move one jump step back. Works whether or not playing.
    pub fn jump_backward(&mut self) -> f64 {
        self.replay_time -= self.jump_step;
        self.replay_time
    }

    fn signed(&self, v: f64) -> f64 {
        match self.direction {
            PlaybackDirection::Forward => v,
            PlaybackDirection::Reverse => -v,
        }
    }

    /// Current position in recorded time.
    pub fn replay_time(&self) -> f64 {
        self.replay_time
    }

    /// Current rate.
    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    /// Set the rate.
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
    }

    /// Current direction.
    pub fn direction(&self) -> PlaybackDirection {
        self.direction
    }

    /// Set the direction.
    pub fn set_direction(&mut self, direction: PlaybackDirection) {
        self.direction = direction;
    }
}

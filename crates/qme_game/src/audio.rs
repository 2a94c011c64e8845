//! Fire-and-forget sound triggers. The mixer lives elsewhere; the simulation
//! only names the sound it wants played.

pub trait AudioSink {
    fn play(&mut self, sound_id: &str);
}

/// Sink used by the headless runner: every trigger becomes a log line.
#[derive(Debug, Default)]
pub struct LogAudio {
    played: u64,
}

impl LogAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> u64 {
        self.played
    }
}

impl AudioSink for LogAudio {
    fn play(&mut self, sound_id: &str) {
        self.played += 1;
        log::debug!("sound: {}", sound_id);
    }
}

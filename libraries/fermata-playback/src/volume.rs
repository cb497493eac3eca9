//! Volume control with logarithmic scaling
//!
//! Level is 0-100%, mapped to -60 dB..0 dB for backends that take a linear gain.

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Volume level (0-100)
    level: u8,

    /// Mute state (preserves volume level)
    muted: bool,
}

impl Volume {
    /// Create a volume controller at `level` (clamped to 100)
    pub fn new(level: u8) -> Self {
        Self {
            level: level.min(100),
            muted: false,
        }
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(100);
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Level the backend should actually apply (0 while muted)
    pub fn effective_level(&self) -> u8 {
        if self.muted {
            0
        } else {
            self.level
        }
    }

    /// Linear gain multiplier
    ///
    /// gain = 10^((level% - 100) * 0.6 / 20)
    /// - 0%   → silence
    /// - 50%  → -30 dB → 0.0316
    /// - 100% →   0 dB → 1.0
    pub fn gain(&self) -> f32 {
        level_to_gain(self.effective_level())
    }
}

/// Map a 0-100 level onto the -60 dB..0 dB curve
pub fn level_to_gain(level: u8) -> f32 {
    if level == 0 {
        return 0.0;
    }
    let db = (f32::from(level.min(100)) - 100.0) * 0.6;
    10.0_f32.powf(db / 20.0)
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(80)
    }
}

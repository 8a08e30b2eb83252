use serde::{Deserialize, Serialize};

pub const TEMPTATION_MAX: i32 = 100;

/// Health pool clamped to `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    /// `max` is floored at 1 so the pool can never be inverted.
    pub fn new(max: i32) -> Self {
        let max = max.max(1);
        Self { current: max, max }
    }

    pub fn damage(&mut self, amount: i32) -> i32 {
        let before = self.current;
        self.current = (self.current - amount.max(0)).clamp(0, self.max);
        before - self.current
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.current;
        self.current = (self.current + amount.max(0)).clamp(0, self.max);
        self.current - before
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

/// The mask pressure meter, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temptation(i32);

impl Temptation {
    pub fn value(&self) -> i32 {
        self.0
    }

    /// Signed shift, clamped. Returns the applied change.
    pub fn shift(&mut self, delta: i32) -> i32 {
        let before = self.0;
        self.0 = (self.0 + delta).clamp(0, TEMPTATION_MAX);
        self.0 - before
    }

    pub fn is_overflowing(&self) -> bool {
        self.0 >= TEMPTATION_MAX
    }
}

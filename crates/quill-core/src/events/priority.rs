//! Priority levels shared by event listeners and hook chain entries.
//!
//! Events run high-to-low; hook chains run low-to-high on the same scale.
//! Callers must not assume the two orderings match.

use serde::{Deserialize, Serialize};

/// Integer ordering key on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPriority(pub i32);

impl EventPriority {
    /// Runs last among event listeners.
    pub const LOWEST: Self = Self(0);
    /// Low priority.
    pub const LOW: Self = Self(25);
    /// Default priority.
    pub const NORMAL: Self = Self(50);
    /// High priority.
    pub const HIGH: Self = Self(75);
    /// Runs first among event listeners.
    pub const HIGHEST: Self = Self(100);

    /// Returns the raw integer value.
    pub fn value(self) -> i32 {
        self.0
    }
}

impl Default for EventPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<i32> for EventPriority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(EventPriority::LOWEST.value(), 0);
        assert_eq!(EventPriority::LOW.value(), 25);
        assert_eq!(EventPriority::NORMAL.value(), 50);
        assert_eq!(EventPriority::HIGH.value(), 75);
        assert_eq!(EventPriority::HIGHEST.value(), 100);
        assert_eq!(EventPriority::default(), EventPriority::NORMAL);
    }
}

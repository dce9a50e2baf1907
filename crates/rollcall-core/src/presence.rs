//! Presence line formatting
//!
//! The counter includes this viewer, so the displayed number is one less.

use std::fmt;

/// Presence counter as reported by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence(pub u64);

impl Presence {
    /// Viewers other than this one
    pub fn others(self) -> u64 {
        self.0.saturating_sub(1)
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.others() {
            0 => write!(f, "No one else is online"),
            1 => write!(f, "1 person is online"),
            n => write!(f, "{} people are online", n),
        }
    }
}

/// Presence line for a counter value
pub fn presence_message(counter: u64) -> String {
    Presence(counter).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(presence_message(0), "No one else is online");
        assert_eq!(presence_message(1), "No one else is online");
        assert_eq!(presence_message(2), "1 person is online");
        assert_eq!(presence_message(3), "2 people are online");
        assert_eq!(presence_message(101), "100 people are online");
    }

    #[test]
    fn test_others() {
        assert_eq!(Presence(0).others(), 0);
        assert_eq!(Presence(5).others(), 4);
    }
}

//! Static mapping from registry name keywords to probe intents.
//!
//! Candidate properties are picked by case-insensitive substring match of the
//! registry constant name against the intent's keyword set.

use alloc::vec::Vec;

use crate::model::{PropertyValue, RegistryConstant};

/// Keywords that mark a registry constant as a gear/park candidate
pub const PARK_STATE_KEYWORDS: &[&str] = &["GEAR", "TRANSMISSION", "PARK", "PARKING", "SHIFT"];

/// Only readings of constants containing this keyword are taken as booleans
pub const PARK_BOOLEAN_KEYWORD: &str = "PARK";

/// What a probe is looking for in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Whether the vehicle is parked
    ParkState,
}

impl Intent {
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::ParkState => PARK_STATE_KEYWORDS,
        }
    }

    /// Whether a registry constant name belongs to this intent
    pub fn matches(self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        self.keywords().iter().any(|keyword| upper.contains(keyword))
    }

    /// Matching constants, in registry enumeration order
    pub fn candidates(self, registry: Vec<RegistryConstant>) -> Vec<RegistryConstant> {
        registry
            .into_iter()
            .filter(|constant| self.matches(&constant.name))
            .collect()
    }

    /// Park flag for a successful reading of `name`
    ///
    /// Only a boolean reading of a `PARK` constant is trusted; every other
    /// reading keeps the fail-safe `true`.
    pub fn interpret(self, name: &str, value: &PropertyValue) -> bool {
        match self {
            Self::ParkState => match value.as_bool() {
                Some(parked) if name.to_ascii_uppercase().contains(PARK_BOOLEAN_KEYWORD) => parked,
                _ => true,
            },
        }
    }
}

//! Chance gates.
//!
//! Grammar: `chance(NN)` with an optional true-random marker `R`, either
//! leading (`R,chance(50)`) or inside the parentheses (`chance(R,50)`). A bare
//! `R` is true-random at 100%.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::form::FormId;
use crate::rng::{salt, RandomGenerator, RngMode};

static CHANCE_RE: OnceLock<Regex> = OnceLock::new();

fn chance_regex() -> &'static Regex {
    CHANCE_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<lead>R)?[\s,]*(?:chance\s*\(\s*(?:(?P<inner>R)[\s,]+)?(?P<value>\d{1,3})\s*\))?$",
        )
        .expect("chance pattern is a valid regex")
    })
}

/// Percentage gate plus the seeding mode used for every draw of its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chance {
    value: u32,
    mode: RngMode,
}

impl Default for Chance {
    fn default() -> Self {
        Self {
            value: Self::ALWAYS,
            mode: RngMode::Seeded,
        }
    }
}

impl Chance {
    /// A gate that never fails.
    pub const ALWAYS: u32 = 100;

    /// Creates a chance gate, clamping `value` into `[0, 100]`.
    #[must_use]
    pub fn new(value: u32, mode: RngMode) -> Self {
        Self {
            value: value.min(Self::ALWAYS),
            mode,
        }
    }

    /// Percentage in `[0, 100]`.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Seeding mode.
    #[must_use]
    pub const fn mode(&self) -> RngMode {
        self.mode
    }

    /// True when the gate cannot fail.
    #[must_use]
    pub const fn is_certain(&self) -> bool {
        self.value >= Self::ALWAYS
    }

    /// Cheap check used to route optional rule fields.
    #[must_use]
    pub fn looks_like(text: &str) -> bool {
        let text = text.trim();
        text.eq_ignore_ascii_case("R") || text.to_ascii_lowercase().contains("chance")
    }

    /// Parses a chance expression. Blank text yields the default gate.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }

        let caps = chance_regex()
            .captures(text)
            .ok_or_else(|| ParseError::malformed("chance", text))?;

        let mode = if caps.name("lead").is_some() || caps.name("inner").is_some() {
            RngMode::TrueRandom
        } else {
            RngMode::Seeded
        };
        let value = match caps.name("value") {
            Some(m) => m
                .as_str()
                .parse::<u32>()
                .map_err(|_| ParseError::malformed("chance", text))?,
            None if mode == RngMode::TrueRandom => Self::ALWAYS,
            None => return Err(ParseError::malformed("chance", text)),
        };

        Ok(Self::new(value, mode))
    }

    /// Rolls the gate for `reference`. A roll above the chance fails.
    #[must_use]
    pub fn passes(&self, reference: FormId) -> bool {
        if self.is_certain() {
            return true;
        }
        if self.value == 0 {
            return false;
        }
        let roll = RandomGenerator::for_mode(self.mode, reference, salt::CHANCE).generate_int(1, 100);
        roll <= i64::from(self.value)
    }
}

impl fmt::Display for Chance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            RngMode::Seeded => write!(f, "chance({})", self.value),
            RngMode::TrueRandom => write!(f, "chance(R,{})", self.value),
        }
    }
}

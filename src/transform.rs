//! Randomized spatial transforms.
//!
//! A transform expression is a comma-joined list of clauses:
//!
//! ```text
//! pos(x,y,z)        absolute position, each axis a number or `lo/hi` range
//! pos(1R,0,0)       an `R` anywhere in the clause makes the group relative
//! rot(0,0,-90/90)   degrees, converted to radians
//! scale(0.8/1.2)    multiplier applied to the current scale
//! ```
//!
//! Commas inside parentheses belong to the clause, so `pos(1/2,3/4,5/6)` is one
//! clause.

use std::f32::consts::TAU;
use std::ops::{Add, AddAssign};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::host::ObjectRef;
use crate::rng::{salt, RandomGenerator, RngMode};

const SCALE_MIN: f32 = 0.0;
const SCALE_MAX: f32 = 1000.0;

static AXES_RE: OnceLock<Regex> = OnceLock::new();
static SINGLE_RE: OnceLock<Regex> = OnceLock::new();

fn axes_regex() -> &'static Regex {
    AXES_RE.get_or_init(|| Regex::new(r"\((.*?),(.*?),(.*?)\)").expect("axes pattern is a valid regex"))
}

fn single_regex() -> &'static Regex {
    SINGLE_RE.get_or_init(|| Regex::new(r"\((.*?)\)").expect("single pattern is a valid regex"))
}

/// Three-component vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X axis.
    pub x: f32,
    /// Y axis.
    pub y: f32,
    /// Z axis.
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Per-axis ranges for position or rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisGroup {
    /// Add to the current value instead of replacing it.
    pub relative: bool,
    /// Lower bound per axis.
    pub min: Vec3,
    /// Upper bound per axis.
    pub max: Vec3,
}

impl AxisGroup {
    fn parse(clause: &str, degrees: bool) -> Result<Self, ParseError> {
        let caps = axes_regex()
            .captures(clause)
            .ok_or_else(|| ParseError::malformed("transform", clause))?;

        let relative = caps.iter().skip(1).flatten().any(|m| m.as_str().contains('R'));

        let mut min = [0.0f32; 3];
        let mut max = [0.0f32; 3];
        for axis in 0..3 {
            let text = caps.get(axis + 1).map_or("", |m| m.as_str());
            let (lo, hi) = parse_range(text).ok_or_else(|| ParseError::malformed("transform", clause))?;
            min[axis] = lo;
            max[axis] = hi;
        }

        let mut group = Self {
            relative,
            min: Vec3::new(min[0], min[1], min[2]),
            max: Vec3::new(max[0], max[1], max[2]),
        };
        if degrees {
            group.min = group.min.map(f32::to_radians);
            group.max = group.max.map(f32::to_radians);
        }
        Ok(group)
    }

    #[allow(clippy::float_cmp)]
    fn draw(&self, make: impl Fn() -> RandomGenerator) -> Vec3 {
        let min = self.min.to_array();
        let max = self.max.to_array();
        let mut rng: Option<RandomGenerator> = None;
        let mut out = [0.0f32; 3];
        for axis in 0..3 {
            out[axis] = if min[axis] == max[axis] {
                min[axis]
            } else {
                rng.get_or_insert_with(&make).generate_float(min[axis], max[axis])
            };
        }
        Vec3::new(out[0], out[1], out[2])
    }
}

/// Parses `n`, `lo/hi`, ignoring `R` markers and whitespace.
fn parse_range(text: &str) -> Option<(f32, f32)> {
    let cleaned: String = text.chars().filter(|c| *c != 'R' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let (lo, hi): (f32, f32) = match cleaned.split_once('/') {
        Some((lo, hi)) => (lo.parse().ok()?, hi.parse().ok()?),
        None => {
            let v = cleaned.parse().ok()?;
            (v, v)
        }
    };
    // Both bounds and the width must be finite.
    (hi - lo).is_finite().then_some((lo, hi))
}

/// Scale multiplier range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    /// Lower multiplier bound.
    pub min: f32,
    /// Upper multiplier bound.
    pub max: f32,
}

impl ScaleRange {
    fn parse(clause: &str) -> Result<Self, ParseError> {
        let inner = single_regex()
            .captures(clause)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| ParseError::malformed("scale", clause))?;
        let (min, max) = parse_range(inner.as_str()).ok_or_else(|| ParseError::malformed("scale", clause))?;
        Ok(Self { min, max })
    }
}

/// Splits on commas that are not nested inside parentheses.
#[must_use]
pub fn split_clauses(text: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                clauses.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    clauses.push(text[start..].trim());
    clauses.retain(|c| !c.is_empty());
    clauses
}

/// Lower-cased name of a clause, the text before its opening parenthesis.
pub(crate) fn clause_name(clause: &str) -> String {
    clause
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Optional position, rotation and scale randomization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// `pos(...)`, in world units.
    pub position: Option<AxisGroup>,
    /// `rot(...)`, stored in radians.
    pub rotation: Option<AxisGroup>,
    /// `scale(...)` multiplier.
    pub scale: Option<ScaleRange>,
}

impl Transform {
    /// Parses a full transform expression. Malformed clauses are reported and
    /// left absent; the rest of the expression still applies.
    pub fn parse(text: &str) -> (Self, Vec<ParseError>) {
        let mut transform = Self::default();
        let mut errors = Vec::new();
        for clause in split_clauses(text) {
            match transform.parse_clause(clause) {
                Ok(true) => {}
                Ok(false) => errors.push(ParseError::malformed("transform", clause)),
                Err(err) => errors.push(err),
            }
        }
        (transform, errors)
    }

    /// Parses one clause into this transform. Returns `Ok(false)` when the
    /// clause is not a transform clause.
    pub fn parse_clause(&mut self, clause: &str) -> Result<bool, ParseError> {
        match clause_name(clause).as_str() {
            "pos" => self.position = Some(AxisGroup::parse(clause, false)?),
            "rot" => self.rotation = Some(AxisGroup::parse(clause, true)?),
            "scale" => self.scale = Some(ScaleRange::parse(clause)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// True when at least one group is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.position.is_some() || self.rotation.is_some() || self.scale.is_some()
    }

    /// Applies the transform to `reference`, drawing random values seeded by the
    /// reference id unless `mode` is true-random.
    pub fn apply(&self, reference: &mut ObjectRef, mode: RngMode) {
        let key = reference.id;
        let placement = &mut reference.placement;

        if let Some(group) = &self.position {
            let value = group.draw(|| RandomGenerator::for_mode(mode, key, salt::POSITION));
            if group.relative {
                placement.position += value;
            } else {
                placement.position = value;
            }
        }

        if let Some(group) = &self.rotation {
            let value = group.draw(|| RandomGenerator::for_mode(mode, key, salt::ROTATION));
            let rotated = if group.relative {
                placement.rotation + value
            } else {
                value
            };
            placement.rotation = rotated.map(|v| v.clamp(-TAU, TAU));
        }

        if let Some(scale) = &self.scale {
            #[allow(clippy::float_cmp)]
            let multiplier = if scale.min == scale.max {
                scale.min
            } else {
                RandomGenerator::for_mode(mode, key, salt::SCALE).generate_float(scale.min, scale.max)
            };
            placement.scale *= multiplier.clamp(SCALE_MIN, SCALE_MAX);
        }
    }
}

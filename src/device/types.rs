use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which camera the stream should come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing camera ("user" facing mode)
    Front,
    /// World-facing camera ("environment" facing mode)
    Rear,
}

impl Facing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Rear => "rear",
        }
    }

    /// Facing mode name as understood by browser media APIs
    pub fn facing_mode(&self) -> &'static str {
        match self {
            Facing::Front => "user",
            Facing::Rear => "environment",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "rear" | "back" | "environment" => Ok(Facing::Rear),
            other => Err(format!("unknown facing '{}'", other)),
        }
    }
}

/// Constraints passed to the media device provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl StreamConstraints {
    pub fn video(facing: Facing, ideal_width: u32, ideal_height: u32) -> Self {
        Self {
            facing,
            ideal_width,
            ideal_height,
            audio: false,
        }
    }
}

/// Facing preference shared between sessions.
///
/// Cloning yields a handle to the same preference, so a hint handed to
/// several sessions is updated by whichever acquires last.
#[derive(Debug, Clone)]
pub struct FacingHint {
    inner: Arc<RwLock<Facing>>,
}

impl FacingHint {
    pub fn new(initial: Facing) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> Facing {
        *self.inner.read()
    }

    pub fn set(&self, facing: Facing) {
        *self.inner.write() = facing;
    }
}

impl Default for FacingHint {
    fn default() -> Self {
        Self::new(Facing::Rear)
    }
}

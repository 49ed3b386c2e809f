//! Deterministic event colors.
//!
//! A title always maps to the same palette entry, in every process and on every
//! run. Distinct titles may share a color.

use serde::Serialize;
use std::fmt;

/// An `#RRGGBB` color from [`PALETTE`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Color(&'static str);

impl Color {
    /// Hex form, `#RRGGBB`
    #[must_use]
    pub const fn hex(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Colors handed out to events, in index order
pub const PALETTE: [Color; 12] = [
    Color("#1F77B4"),
    Color("#FF7F0E"),
    Color("#2CA02C"),
    Color("#D62728"),
    Color("#9467BD"),
    Color("#8C564B"),
    Color("#E377C2"),
    Color("#7F7F7F"),
    Color("#BCBD22"),
    Color("#17BECF"),
    Color("#393B79"),
    Color("#AD494A"),
];

const SEED: u64 = 0x5bd1_e995;
const MULTIPLIER: u64 = 31;

/// Polynomial hash of the UTF-8 bytes of `title`
#[must_use]
pub fn title_hash(title: &str) -> u64 {
    title.bytes().fold(SEED, |hash, byte| {
        hash.wrapping_mul(MULTIPLIER).wrapping_add(u64::from(byte))
    })
}

/// Color for an event title
#[must_use]
pub fn color_for(title: &str) -> Color {
    let len = PALETTE.len() as u64;
    let index = usize::try_from(title_hash(title) % len).unwrap_or(0);
    PALETTE[index]
}

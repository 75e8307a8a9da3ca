//! Severity levels for status reports.

use core::fmt;

/// Severity of a status report or an aggregated node.
///
/// Levels are ordered so that `max()` over a set of levels yields the most
/// severe one. `Stale` ranks above `Error`: a node nobody has heard from in a
/// while is treated as worse than a node that is reporting a failure.
///
/// On the wire a level is its ordinal (`0..=3`). Any other number, negative or
/// fractional ones included, is read as [`Level::Error`], so a producer
/// sending a garbage level still shows up as unhealthy instead of being
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "WireOrdinal", into = "u8"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum Level {
    /// Everything is fine.
    #[default]
    #[cfg_attr(feature = "minicbor", n(0))]
    Ok,
    /// Degraded, but still working.
    #[cfg_attr(feature = "minicbor", n(1))]
    Warn,
    /// Not working.
    #[cfg_attr(feature = "minicbor", n(2))]
    Error,
    /// No recent report.
    #[cfg_attr(feature = "minicbor", n(3))]
    Stale,
}

impl Level {
    /// Wire ordinal of this level.
    pub const fn as_u8(self) -> u8 {
        match self {
            Level::Ok => 0,
            Level::Warn => 1,
            Level::Error => 2,
            Level::Stale => 3,
        }
    }

    /// Canonical summary text used for aggregated header nodes.
    pub const fn summary(self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warn => "Warning",
            Level::Error => "Error",
            Level::Stale => "Stale",
        }
    }

    /// Level for an arbitrary wire ordinal; out-of-range values are `Error`.
    pub const fn from_ordinal(value: i64) -> Self {
        match value {
            0 => Level::Ok,
            1 => Level::Warn,
            2 => Level::Error,
            3 => Level::Stale,
            _ => Level::Error,
        }
    }

    /// Returns true for `Ok`.
    pub fn is_ok(self) -> bool {
        self == Level::Ok
    }
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        Level::from_ordinal(i64::from(value))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.as_u8()
    }
}

/// Any number a producer may send as a level.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum WireOrdinal {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

#[cfg(feature = "serde")]
impl From<WireOrdinal> for Level {
    fn from(wire: WireOrdinal) -> Self {
        match wire {
            WireOrdinal::Signed(value) => Level::from_ordinal(value),
            // Only reached above i64::MAX.
            WireOrdinal::Unsigned(_) => Level::Error,
            WireOrdinal::Float(value) => {
                let ordinal = value as i64;
                if ordinal as f64 == value {
                    Level::from_ordinal(ordinal)
                } else {
                    Level::Error
                }
            }
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

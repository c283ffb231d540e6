// Small shared vocabulary for the control protocol.
//
// `LightColor` is the closed interpretation of the open-ended `state` string
// carried by light messages: only `GREEN` and `AMBER` are recognized, and
// every other value (including `RED`, lowercase variants, and the empty
// string) falls through to the stop colour. `RESET_ACTION` is the one
// `action` value the consumer treats specially.

use std::fmt;

/// Reserved `action` token announcing that an agent was reset to its start.
pub const RESET_ACTION: &str = "REINICIO";

/// Colour a traffic light should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightColor {
    Green,
    Amber,
    /// Stop. Also the fallback for unrecognized phases.
    Red,
}

impl LightColor {
    /// Map a raw phase string to a colour. Matching is exact.
    pub fn from_state(state: &str) -> Self {
        match state {
            "GREEN" => LightColor::Green,
            "AMBER" => LightColor::Amber,
            _ => LightColor::Red,
        }
    }

    /// Canonical phase string, as the simulation sends it.
    pub fn as_str(self) -> &'static str {
        match self {
            LightColor::Green => "GREEN",
            LightColor::Amber => "AMBER",
            LightColor::Red => "RED",
        }
    }
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

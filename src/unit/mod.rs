/*! Scalar quantities with magnitude prefixes and physical units

Every quantity in a network description is either a bare number, which
is taken to be in the canonical unit of its kind, or a string made of a
numeric literal, an optional SI prefix, and a unit suffix (`"10ms"`,
`"1.5kB"`, `"100Mbps"`). This module normalizes both forms into
[UnitValue]s stored in the canonical units:

| kind              | canonical unit  | accepted suffixes           |
|-------------------|-----------------|-----------------------------|
| [UnitKind::Time]  | seconds         | `s`, `m` (minute), `h`      |
| [UnitKind::Data]  | bits            | `b`, `B` (byte = 8 bits)    |
| [UnitKind::Rate]  | bits per second | `{b,B}p{s,m,h}`, e.g. `kBps`|
| [UnitKind::Count] | dimensionless   | none (prefix only)          |

Prefixes are case-sensitive: `m` is milli, `M` is mega. A lone `m`
after a number is a minute, whereas `ms` is a millisecond.

The inverse direction, [format], picks a human-friendly prefix for
display.
*/

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The physical dimension of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    #[display(fmt = "time")]
    Time,
    #[display(fmt = "data")]
    Data,
    #[display(fmt = "rate")]
    Rate,
    #[display(fmt = "count")]
    Count,
}

impl UnitKind {
    /// The symbol of the canonical unit of this kind.
    pub fn base_symbol(self) -> &'static str {
        match self {
            UnitKind::Time => "s",
            UnitKind::Data => "b",
            UnitKind::Rate => "bps",
            UnitKind::Count => "",
        }
    }

    fn suffix_len(self) -> usize {
        match self {
            UnitKind::Time | UnitKind::Data => 1,
            UnitKind::Rate => 3,
            UnitKind::Count => 0,
        }
    }

    /// Factor of a prefix-less unit suffix relative to the canonical unit.
    fn base_factor(self, suffix: &str) -> Option<f64> {
        match self {
            UnitKind::Time => time_factor(suffix),
            UnitKind::Data => data_factor(suffix),
            UnitKind::Rate => {
                let bytes = suffix.as_bytes();
                if bytes.len() != 3 || bytes[1] != b'p' {
                    return None;
                }
                let data = data_factor(&suffix[0..1])?;
                let time = time_factor(&suffix[2..3])?;
                Some(data / time)
            }
            UnitKind::Count => suffix.is_empty().then_some(1.0),
        }
    }

    /// The prefixes that may be used when displaying values of this kind.
    fn display_prefixes(self) -> &'static [Prefix] {
        match self {
            // fractional bits cannot be written down with a prefix
            UnitKind::Data => &Prefix::ALL[6..],
            _ => &Prefix::ALL,
        }
    }
}

fn time_factor(suffix: &str) -> Option<f64> {
    match suffix {
        "s" => Some(1.0),
        "m" => Some(60.0),
        "h" => Some(3600.0),
        _ => None,
    }
}

fn data_factor(suffix: &str) -> Option<f64> {
    match suffix {
        "b" => Some(1.0),
        "B" => Some(8.0),
        _ => None,
    }
}

/// SI magnitude prefixes, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Prefix {
    #[display(fmt = "a")]
    Atto,
    #[display(fmt = "f")]
    Femto,
    #[display(fmt = "p")]
    Pico,
    #[display(fmt = "n")]
    Nano,
    #[display(fmt = "u")]
    Micro,
    #[display(fmt = "m")]
    Milli,
    #[display(fmt = "")]
    None,
    #[display(fmt = "k")]
    Kilo,
    #[display(fmt = "M")]
    Mega,
    #[display(fmt = "G")]
    Giga,
    #[display(fmt = "T")]
    Tera,
    #[display(fmt = "P")]
    Peta,
    #[display(fmt = "E")]
    Exa,
}

impl Prefix {
    /// All prefixes in increasing order of magnitude.
    pub const ALL: [Prefix; 13] = [
        Prefix::Atto,
        Prefix::Femto,
        Prefix::Pico,
        Prefix::Nano,
        Prefix::Micro,
        Prefix::Milli,
        Prefix::None,
        Prefix::Kilo,
        Prefix::Mega,
        Prefix::Giga,
        Prefix::Tera,
        Prefix::Peta,
        Prefix::Exa,
    ];

    pub fn factor(self) -> f64 {
        match self {
            Prefix::Atto => 1e-18,
            Prefix::Femto => 1e-15,
            Prefix::Pico => 1e-12,
            Prefix::Nano => 1e-9,
            Prefix::Micro => 1e-6,
            Prefix::Milli => 1e-3,
            Prefix::None => 1.0,
            Prefix::Kilo => 1e3,
            Prefix::Mega => 1e6,
            Prefix::Giga => 1e9,
            Prefix::Tera => 1e12,
            Prefix::Peta => 1e15,
            Prefix::Exa => 1e18,
        }
    }

    /// Look up a prefix by its symbol. The empty string maps to [Prefix::None].
    pub fn from_symbol(symbol: &str) -> Option<Prefix> {
        Prefix::ALL
            .iter()
            .copied()
            .find(|p| p.to_string() == symbol)
    }
}

/// Error type returned when a quantity cannot be interpreted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("\"{text}\" does not start with a number")]
    MalformedNumber { text: String },
    #[error("\"{text}\" carries a magnitude prefix but no {kind} unit")]
    MissingUnit { text: String, kind: UnitKind },
    #[error("unknown {kind} unit \"{unit}\" in \"{text}\"")]
    UnknownUnit {
        text: String,
        unit: String,
        kind: UnitKind,
    },
    #[error("unknown magnitude prefix \"{prefix}\" in \"{text}\"")]
    UnknownPrefix { text: String, prefix: String },
    #[error("data quantities cannot use the sub-unit prefix \"{prefix}\" (in \"{text}\")")]
    SubUnitDataPrefix { text: String, prefix: Prefix },
}

/// A quantity as written in a description: either a bare number or a
/// string that may carry a prefix and a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Text(String),
}

impl From<f64> for Quantity {
    fn from(x: f64) -> Self {
        Quantity::Number(x)
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Quantity::Text(s.to_string())
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quantity::Number(x) => write!(f, "{}", x),
            Quantity::Text(s) => f.write_str(s),
        }
    }
}

/// A quantity normalized to the canonical unit of its kind.
#[derive(Debug, Clone, Copy, PartialEq, Display)]
#[display(fmt = "{} {}", magnitude, kind)]
pub struct UnitValue {
    pub magnitude: f64,
    pub kind: UnitKind,
}

impl UnitValue {
    pub fn new(magnitude: f64, kind: UnitKind) -> Self {
        UnitValue { magnitude, kind }
    }

    /// Parse a quantity whose bare numbers are already canonical.
    pub fn parse(input: &Quantity, kind: UnitKind) -> Result<UnitValue, UnitError> {
        UnitValue::parse_in(input, kind, None)
    }

    /// Parse a quantity whose bare numbers are written in `written_unit`
    /// (e.g., `"ms"`). Strings with an explicit unit ignore `written_unit`.
    pub fn parse_in(
        input: &Quantity,
        kind: UnitKind,
        written_unit: Option<&str>,
    ) -> Result<UnitValue, UnitError> {
        let bare_factor = match written_unit {
            Some(unit) if !unit.trim().is_empty() => unit_factor(unit.trim(), unit, kind)?,
            _ => 1.0,
        };
        let magnitude = match input {
            Quantity::Number(x) => x * bare_factor,
            Quantity::Text(text) => {
                let trimmed = text.trim();
                if let Ok(x) = trimmed.parse::<f64>() {
                    x * bare_factor
                } else {
                    let (number, unit) = split_number(trimmed).ok_or_else(|| {
                        UnitError::MalformedNumber {
                            text: text.clone(),
                        }
                    })?;
                    number * unit_factor(unit, text, kind)?
                }
            }
        };
        Ok(UnitValue { magnitude, kind })
    }

    /// Render the value with the prefix chosen by [format].
    pub fn to_text(&self) -> String {
        let (magnitude, prefix) = format(self.magnitude, self.kind);
        format!("{}{}{}", magnitude, prefix, self.kind.base_symbol())
    }
}

/// Shorthand for [UnitValue::parse] that only keeps the magnitude.
pub fn parse(input: &Quantity, kind: UnitKind) -> Result<f64, UnitError> {
    UnitValue::parse(input, kind).map(|v| v.magnitude)
}

// Split "1.5kbps" into (1.5, "kbps") by finding the longest numeric head.
fn split_number(text: &str) -> Option<(f64, &str)> {
    (1..text.len())
        .rev()
        .filter(|end| text.is_char_boundary(*end))
        .find_map(|end| {
            let head = text[..end].trim();
            head.parse::<f64>()
                .ok()
                .map(|x| (x, text[end..].trim()))
        })
}

fn unit_factor(unit: &str, text: &str, kind: UnitKind) -> Result<f64, UnitError> {
    let unknown = || UnitError::UnknownUnit {
        text: text.to_string(),
        unit: unit.to_string(),
        kind,
    };
    let is_lone_prefix = |s: &str| !s.is_empty() && Prefix::from_symbol(s).is_some();

    if !unit.is_ascii() {
        return Err(unknown());
    }
    let split = match unit.len().checked_sub(kind.suffix_len()) {
        Some(at) => at,
        None if is_lone_prefix(unit) => {
            return Err(UnitError::MissingUnit {
                text: text.to_string(),
                kind,
            })
        }
        None => return Err(unknown()),
    };
    let (head, suffix) = unit.split_at(split);
    let base = match kind.base_factor(suffix) {
        Some(base) => base,
        None if is_lone_prefix(unit) => {
            return Err(UnitError::MissingUnit {
                text: text.to_string(),
                kind,
            })
        }
        None => return Err(unknown()),
    };
    let prefix = Prefix::from_symbol(head).ok_or_else(|| UnitError::UnknownPrefix {
        text: text.to_string(),
        prefix: head.to_string(),
    })?;
    if kind == UnitKind::Data && prefix < Prefix::None {
        return Err(UnitError::SubUnitDataPrefix {
            text: text.to_string(),
            prefix,
        });
    }
    Ok(prefix.factor() * base)
}

/// Choose the largest prefix such that `1 <= |magnitude| < 1000`, and
/// return the rescaled magnitude together with that prefix.
///
/// Values beyond the prefix table saturate at its ends; zero and
/// non-finite values use no prefix. Data values never use sub-unit
/// prefixes.
pub fn format(value: f64, kind: UnitKind) -> (f64, Prefix) {
    if value == 0.0 || !value.is_finite() {
        return (value, Prefix::None);
    }
    let prefixes = kind.display_prefixes();
    let abs = value.abs();
    if let Some(p) = prefixes
        .iter()
        .find(|p| (1.0..1000.0).contains(&(abs / p.factor())))
    {
        return (value / p.factor(), *p);
    }
    // outside of the table: saturate at whichever end is closer
    let largest = prefixes[prefixes.len() - 1];
    if abs / largest.factor() >= 1000.0 {
        (value / largest.factor(), largest)
    } else {
        let smallest = prefixes[0];
        (value / smallest.factor(), smallest)
    }
}

/// Pick the single smallest prefix that [format] would choose for any
/// of the given values, so that a whole column can be printed with one
/// prefix without losing small magnitudes.
pub fn decide_min_prefix(values: impl IntoIterator<Item = f64>, kind: UnitKind) -> Prefix {
    values
        .into_iter()
        .map(|v| format(v, kind).1)
        .min()
        .unwrap_or(Prefix::None)
}

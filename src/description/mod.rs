/*! The two on-disk description formats

- [output_port]: JSON documents in which every switch output port is
  already an abstract server.
- [physical]: XML documents describing stations, switches, links and
  flows with (possibly multicast) target paths.

Physical descriptions are lowered to output-port ones by
[crate::convert]; only output-port descriptions are turned into
[definitions][crate::definition] directly.
*/

use std::collections::BTreeSet;

use derive_more::Display;
use itertools::Itertools;

use crate::model::Multiplexing;

pub mod output_port;
pub mod physical;

pub use output_port::OutputPortDescription;
pub use physical::PhysicalDescription;

/// A well-known token of the `technology` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum TechFlag {
    #[display(fmt = "FIFO")]
    Fifo,
    /// Packetizer.
    #[display(fmt = "PK")]
    Packetizer,
    /// Input shaping.
    #[display(fmt = "IS")]
    InputShaper,
    #[display(fmt = "CEIL")]
    Ceil,
    #[display(fmt = "MOH")]
    Moh,
    #[display(fmt = "TDMI")]
    Tdmi,
}

impl TechFlag {
    pub const ALL: [TechFlag; 6] = [
        TechFlag::Fifo,
        TechFlag::Packetizer,
        TechFlag::InputShaper,
        TechFlag::Ceil,
        TechFlag::Moh,
        TechFlag::Tdmi,
    ];

    /// Flags that only tune the analysis and carry no model semantics.
    pub const ANALYSIS_OPTIONS: [TechFlag; 4] = [
        TechFlag::InputShaper,
        TechFlag::Ceil,
        TechFlag::Moh,
        TechFlag::Tdmi,
    ];

    pub fn from_token(token: &str) -> Option<TechFlag> {
        TechFlag::ALL
            .iter()
            .copied()
            .find(|f| f.to_string() == token)
    }
}

/// The set of `+`-joined technology tokens of a physical network.
///
/// Unknown tokens are kept verbatim so that rewriting a file does not
/// lose them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Technology {
    flags: BTreeSet<TechFlag>,
    others: Vec<String>,
}

impl Technology {
    pub fn parse(text: &str) -> Technology {
        let mut tech = Technology::default();
        for token in text.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            match TechFlag::from_token(token) {
                Some(flag) => {
                    tech.flags.insert(flag);
                }
                None if !tech.others.iter().any(|o| o == token) => {
                    tech.others.push(token.to_string())
                }
                None => (),
            }
        }
        tech
    }

    /// The technology implied by the network options of an output-port
    /// description.
    pub fn from_options(packetizer: bool, multiplexing: Multiplexing, options: &[String]) -> Self {
        let mut tech = Technology::parse(&options.join("+"));
        if packetizer {
            tech.insert(TechFlag::Packetizer);
        }
        if multiplexing == Multiplexing::Fifo {
            tech.insert(TechFlag::Fifo);
        }
        tech
    }

    pub fn contains(&self, flag: TechFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn insert(&mut self, flag: TechFlag) {
        self.flags.insert(flag);
    }

    pub fn remove(&mut self, flag: TechFlag) {
        self.flags.remove(&flag);
    }

    /// Add every flag of `include`, then drop every flag of `exclude`.
    pub fn enforce(&mut self, include: &[TechFlag], exclude: &[TechFlag]) {
        self.flags.extend(include.iter().copied());
        for flag in exclude {
            self.flags.remove(flag);
        }
    }

    /// Tokens that are not a known [TechFlag].
    pub fn unknown_tokens(&self) -> &[String] {
        &self.others
    }

    pub fn packetizer(&self) -> bool {
        self.contains(TechFlag::Packetizer)
    }

    pub fn multiplexing(&self) -> Multiplexing {
        if self.contains(TechFlag::Fifo) {
            Multiplexing::Fifo
        } else {
            Multiplexing::Arbitrary
        }
    }

    pub fn analysis_options(&self) -> Vec<String> {
        TechFlag::ANALYSIS_OPTIONS
            .iter()
            .filter(|f| self.contains(**f))
            .map(|f| f.to_string())
            .collect()
    }
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let known = self.flags.iter().map(|flag| flag.to_string());
        let all = known.chain(self.others.iter().cloned());
        write!(f, "{}", all.format("+"))
    }
}

#[cfg(test)]
mod tests;

/*! Build configuration

Both switches default to the tolerant behavior: truncated curve arrays
and models without flows are accepted.
*/

use serde::{Deserialize, Serialize};

/// Knobs that control how strictly a description is turned into a model.
///
/// The defaults reproduce the tolerant behavior expected by existing
/// description files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Reject curves whose parallel arrays differ in length instead of
    /// truncating them to the shorter one.
    pub strict_segment_arrays: bool,
    /// Fail the build if every declared flow had to be dropped.
    pub require_flows: bool,
}

impl BuildConfig {
    /// Read a configuration from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

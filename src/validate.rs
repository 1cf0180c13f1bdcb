/*! Consistency checks applied while a model is being built

Each check is a small free function that either passes, records a
[ModelWarning], or returns the [ModelError] that names the offending
entity. The [ModelBuilder][crate::builder::ModelBuilder] invokes them
inline with its stage transitions.
*/

use std::collections::HashSet;

use itertools::Itertools;

use crate::config::BuildConfig;
use crate::error::{ModelError, ModelWarning};

/// Decide how many segments a curve given by two parallel arrays has.
///
/// An empty array aborts the entity. Arrays of different length are
/// truncated to the shorter one (with a warning), or rejected when
/// `config.strict_segment_arrays` is set.
pub fn segment_count(
    owner: &str,
    first_field: &str,
    first_len: usize,
    rates_len: usize,
    config: &BuildConfig,
    warnings: &mut Vec<ModelWarning>,
) -> Result<usize, ModelError> {
    if first_len == 0 {
        return Err(ModelError::MissingSegmentArray {
            owner: owner.to_string(),
            field: first_field.to_string(),
        });
    }
    if rates_len == 0 {
        return Err(ModelError::MissingSegmentArray {
            owner: owner.to_string(),
            field: "rates".to_string(),
        });
    }
    if first_len == rates_len {
        return Ok(first_len);
    }
    if config.strict_segment_arrays {
        return Err(ModelError::SegmentLengthMismatch {
            owner: owner.to_string(),
            first_field: first_field.to_string(),
            first_len,
            rates_len,
        });
    }
    let kept = first_len.min(rates_len);
    let warning = ModelWarning::TruncatedSegments {
        owner: owner.to_string(),
        first_field: first_field.to_string(),
        first_len,
        rates_len,
        kept,
    };
    log::warn!("{}", warning);
    warnings.push(warning);
    Ok(kept)
}

/// The adjacency matrix must be square and sized by the declared servers.
pub fn adjacency_shape(matrix: &[Vec<u8>], declared: usize) -> Result<(), ModelError> {
    if matrix.len() != declared {
        return Err(ModelError::NodeCountMismatch {
            declared,
            adjacency: matrix.len(),
        });
    }
    match matrix.iter().find_position(|row| row.len() != declared) {
        Some((row, entries)) => Err(ModelError::MalformedAdjacency {
            row,
            len: entries.len(),
            expected: declared,
        }),
        None => Ok(()),
    }
}

/// A flow path must be non-empty and visit every server at most once.
pub fn path_shape(flow: &str, path: &[usize], server_names: &[String]) -> Result<(), ModelError> {
    if path.is_empty() {
        return Err(ModelError::EmptyPath {
            flow: flow.to_string(),
        });
    }
    let mut seen = HashSet::new();
    if let Some(repeated) = path.iter().find(|s| !seen.insert(**s)) {
        return Err(ModelError::RepeatedServer {
            flow: flow.to_string(),
            server: server_names
                .get(*repeated)
                .cloned()
                .unwrap_or_else(|| repeated.to_string()),
        });
    }
    Ok(())
}

/// Output capacities must be strictly positive.
pub fn capacity(server: &str, capacity: f64) -> Result<f64, ModelError> {
    if capacity > 0.0 {
        Ok(capacity)
    } else {
        Err(ModelError::InvalidCapacity {
            server: server.to_string(),
            capacity,
        })
    }
}

/// Packet lengths must not be negative.
pub fn packet_length(
    flow: &str,
    which: &'static str,
    length: Option<f64>,
) -> Result<Option<f64>, ModelError> {
    match length {
        Some(l) if l < 0.0 => Err(ModelError::InvalidPacketLength {
            flow: flow.to_string(),
            which,
            length: l,
        }),
        _ => Ok(length),
    }
}

/// Whether losing every flow is acceptable is the caller's decision.
pub fn surviving_flows(
    config: &BuildConfig,
    declared: usize,
    survived: usize,
) -> Result<(), ModelError> {
    if config.require_flows && declared > 0 && survived == 0 {
        Err(ModelError::NoSurvivingFlows { declared })
    } else {
        Ok(())
    }
}

/*! Service and arrival curves built from primitive segments

A [Curve] is a non-empty list of primitive segments of one kind:

- [RateLatency] segments form *service curves*; the curve is the
  pointwise **maximum** of its segments (the best of several
  alternative guarantees).
- [TokenBucket] segments form *arrival curves* (and shapers); the curve
  is the pointwise **minimum** of its segments (the tightest of several
  observed bounds).

Segments are never reduced algebraically. Combining two curves simply
concatenates their segment lists, and [Bound::evaluate] applies the
max/min lazily. Downstream engines that accept multi-segment curves
consume the segment list directly.
*/

use auto_impl::auto_impl;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::error::{ModelError, ModelWarning};

/// Anything that bounds a cumulative amount (of service or data)
/// as a function of the interval length `t` in seconds.
#[auto_impl(&, Box, Rc)]
pub trait Bound {
    fn evaluate(&self, t: f64) -> f64;
}

/// Which way segments of a curve are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CurveKind {
    /// Lower bound on service; segments are combined with `max`.
    #[display(fmt = "service")]
    Service,
    /// Upper bound on traffic; segments are combined with `min`.
    #[display(fmt = "arrival")]
    Arrival,
}

/// A primitive curve segment given by two parameters.
pub trait Segment: Bound + Copy + std::fmt::Debug + PartialEq {
    const KIND: CurveKind;
    /// Name of the first parameter in descriptions (`latencies`/`bursts`).
    const FIRST_FIELD: &'static str;

    fn from_pair(first: f64, rate: f64) -> Self;

    /// The non-rate parameter (latency or burst).
    fn first(&self) -> f64;

    fn rate(&self) -> f64;
}

/// The rate-latency function `rate * max(0, t - latency)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLatency {
    /// Latency in seconds.
    pub latency: f64,
    /// Rate in bits per second.
    pub rate: f64,
}

impl Bound for RateLatency {
    fn evaluate(&self, t: f64) -> f64 {
        if t <= self.latency {
            0.0
        } else {
            self.rate * (t - self.latency)
        }
    }
}

impl Segment for RateLatency {
    const KIND: CurveKind = CurveKind::Service;
    const FIRST_FIELD: &'static str = "latencies";

    fn from_pair(latency: f64, rate: f64) -> Self {
        RateLatency { latency, rate }
    }

    fn first(&self) -> f64 {
        self.latency
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

/// The token-bucket function `burst + rate * t` for `t > 0`, and 0 at `t = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    /// Burst in bits.
    pub burst: f64,
    /// Rate in bits per second.
    pub rate: f64,
}

impl Bound for TokenBucket {
    fn evaluate(&self, t: f64) -> f64 {
        if t > 0.0 {
            self.burst + self.rate * t
        } else {
            0.0
        }
    }
}

impl Segment for TokenBucket {
    const KIND: CurveKind = CurveKind::Arrival;
    const FIRST_FIELD: &'static str = "bursts";

    fn from_pair(burst: f64, rate: f64) -> Self {
        TokenBucket { burst, rate }
    }

    fn first(&self) -> f64 {
        self.burst
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

/// A non-empty list of segments of the same kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve<S: Segment> {
    segments: Vec<S>,
}

/// Maximum of rate-latency segments.
pub type ServiceCurve = Curve<RateLatency>;
/// Minimum of token-bucket segments.
pub type ArrivalCurve = Curve<TokenBucket>;

impl<S: Segment> Curve<S> {
    /// Construct a curve from a list of segments.
    ///
    /// Fails with [ModelError::CurveDefinition] if `segments` is empty.
    pub fn build(owner: &str, segments: Vec<S>) -> Result<Self, ModelError> {
        if segments.is_empty() {
            return Err(ModelError::CurveDefinition {
                owner: owner.to_string(),
                kind: S::KIND,
            });
        }
        Ok(Curve { segments })
    }

    /// A curve made of exactly one segment.
    pub fn single(segment: S) -> Self {
        Curve {
            segments: vec![segment],
        }
    }

    /// Construct a curve from the two parallel arrays of a description
    /// (`latencies`/`rates` or `bursts`/`rates`).
    ///
    /// If both arrays are non-empty but of different length, the longer
    /// one is truncated to the shorter length and a warning is pushed to
    /// `warnings`, unless `config.strict_segment_arrays` asks for an error.
    pub fn from_arrays(
        owner: &str,
        first: &[f64],
        rates: &[f64],
        config: &BuildConfig,
        warnings: &mut Vec<ModelWarning>,
    ) -> Result<Self, ModelError> {
        let n = crate::validate::segment_count(
            owner,
            S::FIRST_FIELD,
            first.len(),
            rates.len(),
            config,
            warnings,
        )?;
        let segments = first
            .iter()
            .zip(rates.iter())
            .take(n)
            .map(|(a, r)| S::from_pair(*a, *r))
            .collect();
        Curve::build(owner, segments)
    }

    pub fn segments(&self) -> &[S] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; provided for symmetry with [Curve::len].
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first declared segment.
    pub fn first(&self) -> &S {
        // non-empty by construction
        &self.segments[0]
    }

    /// The largest rate over all segments.
    pub fn max_rate(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.rate())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Lazily combine two curves of the same kind: the result holds the
    /// segments of both, in order.
    pub fn combine(&self, other: &Curve<S>) -> Curve<S> {
        Curve {
            segments: self
                .segments
                .iter()
                .chain(other.segments.iter())
                .copied()
                .collect(),
        }
    }

    /// The two parameter arrays, as written in descriptions.
    pub fn to_arrays(&self) -> (Vec<f64>, Vec<f64>) {
        self.segments.iter().map(|s| (s.first(), s.rate())).unzip()
    }
}

impl<S: Segment> Bound for Curve<S> {
    fn evaluate(&self, t: f64) -> f64 {
        let values = self.segments.iter().map(|s| s.evaluate(t));
        let combined = match S::KIND {
            CurveKind::Service => values.fold(f64::NEG_INFINITY, f64::max),
            CurveKind::Arrival => values.fold(f64::INFINITY, f64::min),
        };
        combined.max(0.0)
    }
}

impl<S: Segment + std::fmt::Display> std::fmt::Display for Curve<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match S::KIND {
            CurveKind::Service => "max",
            CurveKind::Arrival => "min",
        };
        write!(f, "{} [{}]", op, self.segments.iter().join(", "))
    }
}

impl std::fmt::Display for RateLatency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(t - {})_+", self.rate, self.latency)
    }
}

impl std::fmt::Display for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {}t", self.burst, self.rate)
    }
}

/// The maximum-service shaping curve of a server: a single token bucket
/// whose burst is the largest packet that can cross the server and whose
/// rate is the server's output capacity.
pub fn derive_shaper(max_packet_length: f64, output_capacity: f64) -> ArrivalCurve {
    Curve::single(TokenBucket {
        burst: max_packet_length,
        rate: output_capacity,
    })
}

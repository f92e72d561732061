use std::fmt;

use rum_common::Attributes;

/// The outcome of a sampling decision.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SamplingDecision {
    /// The span is not recorded and all events and attributes are dropped.
    NotRecord,
    /// The span is recorded and exported.
    RecordAndSampled,
}

impl SamplingDecision {
    /// Returns `true` if the span is recorded.
    pub fn is_recording(self) -> bool {
        matches!(self, Self::RecordAndSampled)
    }
}

/// The result of [`Sampler::should_sample`].
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingResult {
    /// The decision.
    pub decision: SamplingDecision,
    /// Attributes the sampler adds to the span.
    pub attributes: Attributes,
}

impl SamplingResult {
    /// Creates a result without additional attributes.
    pub fn new(decision: SamplingDecision) -> Self {
        Self {
            decision,
            attributes: Attributes::new(),
        }
    }
}

/// The inputs of a sampling decision.
#[derive(Clone, Copy, Debug)]
pub struct SamplingParameters<'a> {
    /// Trace id of the span, as hex.
    pub trace_id: &'a str,
    /// Name of the span.
    pub name: &'a str,
    /// Attributes the span starts with.
    pub attributes: &'a Attributes,
}

/// Decides at span start whether a span is recorded.
pub trait Sampler: Send + Sync + fmt::Debug {
    /// Returns the sampling decision for a span about to start.
    fn should_sample(&self, parameters: &SamplingParameters<'_>) -> SamplingResult;

    /// Returns a short description of the sampler.
    fn description(&self) -> String;
}

/// Samples every span.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnSampler;

impl Sampler for AlwaysOnSampler {
    fn should_sample(&self, _: &SamplingParameters<'_>) -> SamplingResult {
        SamplingResult::new(SamplingDecision::RecordAndSampled)
    }

    fn description(&self) -> String {
        "AlwaysOnSampler".to_owned()
    }
}

/// Drops every span.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOffSampler;

impl Sampler for AlwaysOffSampler {
    fn should_sample(&self, _: &SamplingParameters<'_>) -> SamplingResult {
        SamplingResult::new(SamplingDecision::NotRecord)
    }

    fn description(&self) -> String {
        "AlwaysOffSampler".to_owned()
    }
}

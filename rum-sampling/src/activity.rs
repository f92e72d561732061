use std::fmt;
use std::sync::Arc;

use rum_session::SessionIdSource;

use crate::sampler::{Sampler, SamplingParameters, SamplingResult};

/// Wraps the configured sampler and brings the session up to date before every decision.
///
/// When every span counts as activity, a span start renews the session before the wrapped
/// sampler looks up the session id. Otherwise the session is only refreshed.
pub struct ActivitySampler<S> {
    inner: S,
    source: Arc<dyn SessionIdSource>,
    all_spans_are_activity: bool,
}

impl<S: Sampler> ActivitySampler<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, source: Arc<dyn SessionIdSource>, all_spans_are_activity: bool) -> Self {
        Self {
            inner,
            source,
            all_spans_are_activity,
        }
    }
}

impl<S: Sampler> Sampler for ActivitySampler<S> {
    fn should_sample(&self, parameters: &SamplingParameters<'_>) -> SamplingResult {
        self.source.record_activity(self.all_spans_are_activity);
        self.inner.should_sample(parameters)
    }

    fn description(&self) -> String {
        format!("ActivitySampler{{{}}}", self.inner.description())
    }
}

impl<S: fmt::Debug> fmt::Debug for ActivitySampler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivitySampler")
            .field("inner", &self.inner)
            .field("all_spans_are_activity", &self.all_spans_are_activity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rum_common::{Attributes, SessionId};

    use super::*;
    use crate::{AlwaysOnSampler, SamplingDecision};

    #[derive(Default)]
    struct CountingSource {
        activity: AtomicUsize,
        refreshes: AtomicUsize,
    }

    impl SessionIdSource for CountingSource {
        fn session_id(&self) -> Option<SessionId> {
            None
        }

        fn record_activity(&self, had_activity: bool) {
            let counter = if had_activity {
                &self.activity
            } else {
                &self.refreshes
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample(sampler: &impl Sampler) -> SamplingDecision {
        let attributes = Attributes::new();
        sampler
            .should_sample(&SamplingParameters {
                trace_id: "1",
                name: "span",
                attributes: &attributes,
            })
            .decision
    }

    #[test]
    fn test_all_spans_are_activity() {
        let source = Arc::new(CountingSource::default());
        let sampler = ActivitySampler::new(AlwaysOnSampler, source.clone(), true);

        assert_eq!(sample(&sampler), SamplingDecision::RecordAndSampled);
        assert_eq!(source.activity.load(Ordering::SeqCst), 1);
        assert_eq!(source.refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_spans_only_refresh() {
        let source = Arc::new(CountingSource::default());
        let sampler = ActivitySampler::new(AlwaysOnSampler, source.clone(), false);

        sample(&sampler);
        assert_eq!(source.activity.load(Ordering::SeqCst), 0);
        assert_eq!(source.refreshes.load(Ordering::SeqCst), 1);
    }
}

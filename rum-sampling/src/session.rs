use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use rum_common::{ParseSessionIdError, SessionId};
use rum_session::SessionIdSource;

use crate::sampler::{
    AlwaysOffSampler, AlwaysOnSampler, Sampler, SamplingParameters, SamplingResult,
};

/// `2^64` as a float, the size of the sampled key space.
const KEY_SPACE: f64 = 18_446_744_073_709_551_616.0;

/// Returns `true` if the session falls into the sampled fraction `ratio`.
///
/// The leading 64 bits of the id are compared against `ratio * 2^64`. A ratio of `1` or more
/// samples every session, a ratio of `0` or less (or NaN) samples none.
pub fn is_session_sampled(id: &SessionId, ratio: f64) -> bool {
    if ratio.is_nan() || ratio <= 0.0 {
        return false;
    }

    if ratio >= 1.0 {
        return true;
    }

    // The key is an integer, so comparing against the rounded up threshold is exact. Rounding
    // up also keeps the all-zero key sampled for the smallest positive ratios.
    let threshold = (ratio * KEY_SPACE).ceil() as u128;
    u128::from(id.high_bits()) < threshold
}

/// Clamps a ratio into `[0, 1]`, mapping NaN to `0`.
fn normalize(ratio: f64) -> f64 {
    if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) }
}

/// Samples spans by the current session id.
///
/// The decision is computed once per session and cached until the session id changes. Sampled
/// sessions delegate to the `sampled` sampler, all others to `not_sampled`.
pub struct SessionBasedSampler {
    ratio: f64,
    source: Arc<dyn SessionIdSource>,
    sampled: Box<dyn Sampler>,
    not_sampled: Box<dyn Sampler>,
    current: Mutex<Option<(SessionId, bool)>>,
}

impl SessionBasedSampler {
    /// Creates a sampler that records the given fraction of sessions.
    pub fn new(ratio: f64, source: Arc<dyn SessionIdSource>) -> Self {
        Self {
            ratio: normalize(ratio),
            source,
            sampled: Box::new(AlwaysOnSampler),
            not_sampled: Box::new(AlwaysOffSampler),
            current: Mutex::new(None),
        }
    }

    /// Replaces the samplers used for sampled and not sampled sessions.
    pub fn with_delegates(
        mut self,
        sampled: Box<dyn Sampler>,
        not_sampled: Box<dyn Sampler>,
    ) -> Self {
        self.sampled = sampled;
        self.not_sampled = not_sampled;
        self
    }

    /// Returns the normalized ratio.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Returns `true` if a session with the given id is sampled.
    ///
    /// Fails if `id` is not a 32 character hex string.
    pub fn is_session_sampled(&self, id: &str) -> Result<bool, ParseSessionIdError> {
        let id = SessionId::parse(id)?;
        Ok(is_session_sampled(&id, self.ratio))
    }

    /// Returns the cached decision for the current session, recomputing it on session change.
    fn current_session_sampled(&self) -> bool {
        let Some(id) = self.source.session_id() else {
            return false;
        };

        let mut current = self.current.lock();
        match *current {
            Some((ref cached, sampled)) if *cached == id => sampled,
            _ => {
                let sampled = is_session_sampled(&id, self.ratio);
                rum_log::trace!(
                    session_id = %id,
                    sampled,
                    ratio = self.ratio,
                    "computed session sampling decision"
                );
                *current = Some((id, sampled));
                sampled
            }
        }
    }
}

impl Sampler for SessionBasedSampler {
    fn should_sample(&self, parameters: &SamplingParameters<'_>) -> SamplingResult {
        if self.current_session_sampled() {
            self.sampled.should_sample(parameters)
        } else {
            self.not_sampled.should_sample(parameters)
        }
    }

    fn description(&self) -> String {
        format!("SessionBased{{ratio={}}}", self.ratio)
    }
}

impl fmt::Debug for SessionBasedSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBasedSampler")
            .field("ratio", &self.ratio)
            .field("sampled", &self.sampled)
            .field("not_sampled", &self.not_sampled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rum_common::Attributes;

    use super::*;
    use crate::SamplingDecision;

    fn id(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[derive(Debug, Default)]
    struct FixedSession(Mutex<Option<SessionId>>, AtomicUsize);

    impl SessionIdSource for FixedSession {
        fn session_id(&self) -> Option<SessionId> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.lock().clone()
        }
    }

    fn decide(sampler: &SessionBasedSampler) -> SamplingDecision {
        let attributes = Attributes::new();
        sampler
            .should_sample(&SamplingParameters {
                trace_id: "0000000000000000",
                name: "test",
                attributes: &attributes,
            })
            .decision
    }

    #[test]
    fn test_ratio_one_samples_everything() {
        assert!(is_session_sampled(&id(&"f".repeat(32)), 1.0));
        assert!(is_session_sampled(&id(&"0".repeat(32)), 1.0));
    }

    #[test]
    fn test_ratio_zero_samples_nothing() {
        assert!(!is_session_sampled(&id(&"0".repeat(32)), 0.0));
        assert!(!is_session_sampled(&id(&"f".repeat(32)), 0.0));
        assert!(!is_session_sampled(&id(&"0".repeat(32)), f64::NAN));
    }

    #[test]
    fn test_zero_id_sampled_for_any_positive_ratio() {
        let zero = id(&"0".repeat(32));
        for ratio in [1e-12, 1e-19, 1e-20, 1e-30, f64::MIN_POSITIVE] {
            assert!(is_session_sampled(&zero, ratio), "ratio {ratio}");
        }

        // A tiny ratio still only samples the smallest key.
        assert!(!is_session_sampled(&id("00000000000000010000000000000000"), 1e-30));
    }

    #[test]
    fn test_threshold_boundary() {
        // 0.5 * 2^64 == 0x8000000000000000
        let below = id("7fffffffffffffffffffffffffffffff");
        let at = id("80000000000000000000000000000000");
        assert!(is_session_sampled(&below, 0.5));
        assert!(!is_session_sampled(&at, 0.5));

        // 0.25 * 2^64 == 0x4000000000000000
        assert!(is_session_sampled(&id("3fffffffffffffff0000000000000000"), 0.25));
        assert!(!is_session_sampled(&id("4000000000000000ffffffffffffffff"), 0.25));
    }

    #[test]
    fn test_only_leading_bits_matter() {
        let a = id("7fffffffffffffff0000000000000000");
        let b = id("7fffffffffffffffffffffffffffffff");
        for ratio in [0.1, 0.5, 0.9] {
            assert_eq!(is_session_sampled(&a, ratio), is_session_sampled(&b, ratio));
        }
    }

    #[test]
    fn test_deterministic() {
        let session = SessionId::random();
        let first = is_session_sampled(&session, 0.3);
        for _ in 0..100 {
            assert_eq!(is_session_sampled(&session, 0.3), first);
        }
    }

    #[test]
    fn test_string_api_validates() {
        let sampler = SessionBasedSampler::new(0.5, Arc::new(FixedSession::default()));
        assert_eq!(sampler.is_session_sampled(&"0".repeat(32)), Ok(true));
        assert_eq!(sampler.is_session_sampled(&"f".repeat(32)), Ok(false));
        assert_eq!(
            sampler.is_session_sampled("1234"),
            Err(ParseSessionIdError::InvalidLength(4))
        );
        assert_eq!(
            sampler.is_session_sampled(&"z".repeat(32)),
            Err(ParseSessionIdError::InvalidCharacters)
        );
    }

    #[test]
    fn test_ratio_normalized() {
        let source = Arc::new(FixedSession::default());
        assert_eq!(SessionBasedSampler::new(7.0, source.clone()).ratio(), 1.0);
        assert_eq!(SessionBasedSampler::new(-1.0, source.clone()).ratio(), 0.0);
        assert_eq!(SessionBasedSampler::new(f64::NAN, source).ratio(), 0.0);
    }

    #[test]
    fn test_decision_follows_current_session() {
        let source = Arc::new(FixedSession::default());
        let sampler = SessionBasedSampler::new(0.5, source.clone());

        *source.0.lock() = Some(id(&"0".repeat(32)));
        assert_eq!(decide(&sampler), SamplingDecision::RecordAndSampled);

        *source.0.lock() = Some(id("1234567890abcdeffedcba0987654321"));
        assert_eq!(decide(&sampler), SamplingDecision::RecordAndSampled);

        *source.0.lock() = Some(id("f234567890abcdeffedcba0987654321"));
        assert_eq!(decide(&sampler), SamplingDecision::NotRecord);

        // The id is read for every decision.
        assert_eq!(source.1.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_session_is_not_sampled() {
        let sampler = SessionBasedSampler::new(1.0, Arc::new(FixedSession::default()));
        assert_eq!(decide(&sampler), SamplingDecision::NotRecord);
    }

    #[test]
    fn test_delegates() {
        let source = Arc::new(FixedSession::default());
        *source.0.lock() = Some(id(&"f".repeat(32)));

        let sampler = SessionBasedSampler::new(0.5, source)
            .with_delegates(Box::new(AlwaysOffSampler), Box::new(AlwaysOnSampler));
        assert_eq!(decide(&sampler), SamplingDecision::RecordAndSampled);
    }
}

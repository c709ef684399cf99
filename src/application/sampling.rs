//! Plateau convergence detection and the sampling loop that drives it
//!
//! A chart render is declared finished when its image stops changing:
//! M consecutive identical captures taken D apart. The detector tracks the
//! run length; the [`Sampler`] owns the timing, the capture source and the
//! optional per-job sample budget.

use tracing::{debug, warn};

use crate::domain::models::JobId;
use crate::domain::ports::{FaultSink, SampleSource};

/// Result of feeding one sample to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleVerdict {
    /// The run is still shorter than required.
    Unsettled,
    /// The required run length has been reached.
    Settled,
}

/// Run-length plateau detector.
///
/// Each sample either extends the current run (identical to the previous
/// sample) or starts a new run of one. Settlement is declared the moment
/// the run reaches the required length, so with a requirement of 3 the
/// sequence A,A,A settles on the third sample and A,B,A,A,A on the fifth.
/// A,A alone never settles.
///
/// State is O(1): one remembered frame and a counter, regardless of how
/// long sampling runs.
#[derive(Debug)]
pub struct ConvergenceDetector {
    required_run: u32,
    last: Option<Vec<u8>>,
    run: u32,
}

impl ConvergenceDetector {
    /// Create a detector requiring `required_run` consecutive identical
    /// samples.
    pub const fn new(required_run: u32) -> Self {
        Self {
            required_run,
            last: None,
            run: 0,
        }
    }

    /// Feed one captured frame.
    pub fn observe(&mut self, frame: &[u8]) -> SampleVerdict {
        if self.last.as_deref() == Some(frame) {
            self.run += 1;
        } else {
            self.last = Some(frame.to_vec());
            self.run = 1;
        }

        if self.run >= self.required_run {
            SampleVerdict::Settled
        } else {
            SampleVerdict::Unsettled
        }
    }

    /// Note a failed capture: the remembered frame is wiped and the run
    /// restarts, so settlement always means a full run of consecutive
    /// successful identical captures.
    pub fn record_failure(&mut self) {
        self.last = None;
        self.run = 0;
    }

    /// Current run length, for diagnostics.
    pub const fn run_length(&self) -> u32 {
        self.run
    }
}

/// How a sampling run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplingOutcome {
    /// The render settled; carries the final stable image.
    Settled {
        /// The settled image bytes.
        image: Vec<u8>,
        /// Samples taken, including failed captures.
        samples: u32,
    },
    /// The sample budget ran out before settlement.
    BudgetExhausted {
        /// Samples taken, including failed captures.
        samples: u32,
    },
}

/// Drives a [`SampleSource`] until the render settles or the budget runs
/// out, waiting a fixed interval before every capture.
///
/// Capture failures are reported to the [`FaultSink`] as they happen and
/// count against the budget; they never end the run on their own.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    interval: std::time::Duration,
    required_run: u32,
    max_samples: Option<u32>,
}

impl Sampler {
    /// Create a sampler with interval D, required run M and an optional
    /// sample budget.
    pub const fn new(
        interval: std::time::Duration,
        required_run: u32,
        max_samples: Option<u32>,
    ) -> Self {
        Self {
            interval,
            required_run,
            max_samples,
        }
    }

    /// Sample `source` for `job_id` until settlement or budget exhaustion.
    pub async fn run(
        &self,
        job_id: JobId,
        source: &mut dyn SampleSource,
        faults: &dyn FaultSink,
    ) -> SamplingOutcome {
        let mut detector = ConvergenceDetector::new(self.required_run);
        let mut ticker = tokio::time::interval(self.interval);
        // The first interval tick completes immediately; burn it so every
        // capture happens a full interval after the previous step.
        ticker.tick().await;

        let mut samples: u32 = 0;
        loop {
            ticker.tick().await;
            samples += 1;

            match source.sample().await {
                Ok(frame) => {
                    if detector.observe(&frame) == SampleVerdict::Settled {
                        debug!(job_id, samples, "render settled");
                        return SamplingOutcome::Settled {
                            image: frame,
                            samples,
                        };
                    }
                }
                Err(err) => {
                    warn!(job_id, samples, error = %err, "sample capture failed");
                    detector.record_failure();
                    faults.report(job_id, &err.to_string()).await;
                }
            }

            if let Some(budget) = self.max_samples {
                if samples >= budget {
                    debug!(job_id, samples, "sample budget exhausted");
                    return SamplingOutcome::BudgetExhausted { samples };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::SampleError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_identical_run_settles_at_required_length() {
        let mut detector = ConvergenceDetector::new(3);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Settled);
    }

    #[test]
    fn test_change_restarts_run() {
        let mut detector = ConvergenceDetector::new(3);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"B"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Settled);
    }

    #[test]
    fn test_short_run_never_settles() {
        let mut detector = ConvergenceDetector::new(3);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.run_length(), 2);
    }

    #[test]
    fn test_failure_wipes_remembered_frame() {
        let mut detector = ConvergenceDetector::new(3);
        detector.observe(b"A");
        detector.observe(b"A");
        detector.record_failure();
        assert_eq!(detector.run_length(), 0);

        // The frame after a failure starts a fresh run even if it matches
        // what came before the failure.
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Unsettled);
        assert_eq!(detector.observe(b"A"), SampleVerdict::Settled);
    }

    #[test]
    fn test_single_sample_requirement() {
        let mut detector = ConvergenceDetector::new(1);
        assert_eq!(detector.observe(b"anything"), SampleVerdict::Settled);
    }

    #[derive(Debug)]
    struct ScriptedSource {
        frames: Vec<Result<Vec<u8>, SampleError>>,
        cursor: usize,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<Vec<u8>, SampleError>>) -> Self {
            Self { frames, cursor: 0 }
        }
    }

    #[async_trait]
    impl SampleSource for ScriptedSource {
        async fn sample(&mut self) -> Result<Vec<u8>, SampleError> {
            let frame = match self.frames.get(self.cursor) {
                Some(Ok(bytes)) => Ok(bytes.clone()),
                Some(Err(err)) => Err(SampleError::Capture(err.to_string())),
                // Past the script the source repeats its final frame.
                None => Ok(self
                    .frames
                    .iter()
                    .rev()
                    .find_map(|f| f.as_ref().ok().cloned())
                    .unwrap_or_default()),
            };
            self.cursor += 1;
            frame
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        reports: Mutex<Vec<(JobId, String)>>,
    }

    #[async_trait]
    impl FaultSink for CollectingSink {
        async fn report(&self, job_id: JobId, message: &str) {
            self.reports
                .lock()
                .unwrap()
                .push((job_id, message.to_string()));
        }
    }

    #[tokio::test]
    async fn test_sampler_settles_on_stable_source() {
        let sampler = Sampler::new(Duration::from_millis(1), 3, None);
        let mut source = ScriptedSource::new(vec![
            Ok(b"frame1".to_vec()),
            Ok(b"frame2".to_vec()),
            Ok(b"frame2".to_vec()),
            Ok(b"frame2".to_vec()),
        ]);
        let sink = CollectingSink::default();

        let outcome = sampler.run(0, &mut source, &sink).await;
        assert_eq!(
            outcome,
            SamplingOutcome::Settled {
                image: b"frame2".to_vec(),
                samples: 4,
            }
        );
        assert!(sink.reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sampler_reports_faults_and_recovers() {
        let sampler = Sampler::new(Duration::from_millis(1), 2, None);
        let mut source = ScriptedSource::new(vec![
            Ok(b"frame".to_vec()),
            Err(SampleError::Capture("camera blinked".to_string())),
            Ok(b"frame".to_vec()),
            Ok(b"frame".to_vec()),
        ]);
        let sink = CollectingSink::default();

        let outcome = sampler.run(7, &mut source, &sink).await;
        assert!(matches!(
            outcome,
            SamplingOutcome::Settled { samples: 4, .. }
        ));

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, 7);
        assert!(reports[0].1.contains("camera blinked"));
    }

    #[tokio::test]
    async fn test_sampler_budget_exhaustion() {
        let sampler = Sampler::new(Duration::from_millis(1), 3, Some(5));
        // Every frame differs, so no run can form.
        let frames = (0..6_u8).map(|i| Ok(vec![i])).collect();
        let mut source = ScriptedSource::new(frames);
        let sink = CollectingSink::default();

        let outcome = sampler.run(1, &mut source, &sink).await;
        assert_eq!(outcome, SamplingOutcome::BudgetExhausted { samples: 5 });
    }

    #[tokio::test]
    async fn test_settlement_beats_budget_on_final_sample() {
        let sampler = Sampler::new(Duration::from_millis(1), 2, Some(2));
        let mut source =
            ScriptedSource::new(vec![Ok(b"same".to_vec()), Ok(b"same".to_vec())]);
        let sink = CollectingSink::default();

        let outcome = sampler.run(0, &mut source, &sink).await;
        assert!(matches!(outcome, SamplingOutcome::Settled { samples: 2, .. }));
    }

    #[tokio::test]
    async fn test_failed_captures_consume_budget() {
        let sampler = Sampler::new(Duration::from_millis(1), 3, Some(3));
        let mut source = ScriptedSource::new(vec![
            Err(SampleError::Capture("one".to_string())),
            Err(SampleError::Capture("two".to_string())),
            Err(SampleError::Capture("three".to_string())),
        ]);
        let sink = CollectingSink::default();

        let outcome = sampler.run(0, &mut source, &sink).await;
        assert_eq!(outcome, SamplingOutcome::BudgetExhausted { samples: 3 });
        assert_eq!(sink.reports.lock().unwrap().len(), 3);
    }
}

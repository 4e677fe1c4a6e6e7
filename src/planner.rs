//! The narrative-planning seam and its degradation policy.
//!
//! A `NarrativePlanner` turns one context batch into one shot descriptor per
//! member segment. The collaborator is typically a generative-text service, so
//! this boundary owns two behaviors the rest of the pipeline relies on:
//! - transient failures are retried with exponential backoff
//! - a batch that still fails degrades to default descriptors instead of
//!   aborting the build

use std::time::Duration;

use tracing::{debug, warn};

use crate::batcher::Batch;
use crate::error::{Error, Result};
use crate::shots::{PlannedShot, ShotDescriptor, bind_shots};

/// Pluggable shot-planning collaborator.
///
/// `cast` lists the character names recognized across the selected sources so
/// the planner only requests characters the matcher can actually find.
/// Implementations should return one descriptor per member segment, in order;
/// the caller tolerates count mismatches.
pub trait NarrativePlanner {
    fn plan_batch(&mut self, batch: &Batch, cast: &[String]) -> Result<Vec<ShotDescriptor>>;
}

/// Retry schedule for one batch against the planner.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before degrading to defaults.
    pub attempts: u32,

    /// Delay before the second attempt; doubles after every retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and offline planners.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Plan shots for every batch, degrading per batch rather than failing.
///
/// Only [`Error::ExternalService`] is treated as transient and retried; any
/// other planner error falls back to defaults immediately. The returned
/// sequence always covers every segment of every batch, in narration order.
pub fn plan_script(
    planner: &mut dyn NarrativePlanner,
    batches: &[Batch],
    cast: &[String],
    policy: &RetryPolicy,
) -> Vec<PlannedShot> {
    let mut script: Vec<PlannedShot> = Vec::new();

    for batch in batches {
        match plan_one(planner, batch, cast, policy) {
            Ok(descriptors) => {
                debug!(batch_id = batch.batch_id, "batch planned");
                script.extend(bind_shots(&batch.segments, descriptors));
            }
            Err(err) => {
                warn!(
                    batch_id = batch.batch_id,
                    error = %err,
                    "planner unavailable; using default descriptors"
                );
                script.extend(bind_shots(&batch.segments, Vec::new()));
            }
        }
    }

    script
}

fn plan_one(
    planner: &mut dyn NarrativePlanner,
    batch: &Batch,
    cast: &[String],
    policy: &RetryPolicy,
) -> Result<Vec<ShotDescriptor>> {
    let attempts = policy.attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match planner.plan_batch(batch, cast) {
            Ok(descriptors) => return Ok(descriptors),

            Err(Error::ExternalService(reason)) if attempt < attempts => {
                warn!(
                    batch_id = batch.batch_id,
                    attempt,
                    retry_in_seconds = delay.as_secs_f32(),
                    %reason,
                    "planner call failed; retrying"
                );
                std::thread::sleep(delay);
                delay *= 2;
            }

            // Anything else will not get better by retrying.
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::Segment;
    use crate::shots::ShotType;

    fn batch(batch_id: usize, segment_ids: &[usize]) -> Batch {
        let segments: Vec<Segment> = segment_ids
            .iter()
            .map(|&segment_id| Segment {
                segment_id,
                start_seconds: 0.0,
                end_seconds: 2.0,
                duration_seconds: 2.0,
                text: format!("segment {segment_id}."),
            })
            .collect();

        Batch {
            batch_id,
            context_text: String::new(),
            segments,
        }
    }

    fn descriptor(segment_id: usize) -> ShotDescriptor {
        ShotDescriptor {
            segment_id,
            visual_query: "planned".to_string(),
            shot_type: ShotType::WideAngle,
            character: None,
            mood: "Calm".to_string(),
            target_duration_seconds: None,
        }
    }

    /// Fails with the scripted errors before succeeding.
    struct FlakyPlanner {
        failures: Vec<Error>,
        calls: u32,
    }

    impl NarrativePlanner for FlakyPlanner {
        fn plan_batch(&mut self, batch: &Batch, _cast: &[String]) -> Result<Vec<ShotDescriptor>> {
            self.calls += 1;
            if let Some(err) = self.failures.pop() {
                return Err(err);
            }
            Ok(batch
                .segments
                .iter()
                .map(|s| descriptor(s.segment_id))
                .collect())
        }
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut planner = FlakyPlanner {
            failures: vec![
                Error::ExternalService("quota".into()),
                Error::ExternalService("quota".into()),
            ],
            calls: 0,
        };

        let script = plan_script(
            &mut planner,
            &[batch(0, &[0, 1])],
            &[],
            &RetryPolicy::immediate(5),
        );

        assert_eq!(planner.calls, 3);
        assert_eq!(script.len(), 2);
        assert_eq!(script[0].shot.visual_query, "planned");
    }

    #[test]
    fn exhausted_retries_degrade_to_defaults() {
        let mut planner = FlakyPlanner {
            failures: (0..5)
                .map(|_| Error::ExternalService("down".into()))
                .collect(),
            calls: 0,
        };

        let script = plan_script(
            &mut planner,
            &[batch(0, &[0, 1, 2])],
            &[],
            &RetryPolicy::immediate(3),
        );

        assert_eq!(planner.calls, 3);
        assert_eq!(script.len(), 3);
        assert!(script.iter().all(|p| p.shot.visual_query == "scene from the movie"));
    }

    #[test]
    fn non_transient_errors_skip_retries() {
        let mut planner = FlakyPlanner {
            failures: vec![Error::missing_input("bad prompt")],
            calls: 0,
        };

        let script = plan_script(
            &mut planner,
            &[batch(0, &[7])],
            &[],
            &RetryPolicy::immediate(5),
        );

        assert_eq!(planner.calls, 1);
        assert_eq!(script.len(), 1);
        assert_eq!(script[0].shot, ShotDescriptor::fallback(7));
    }

    #[test]
    fn one_failing_batch_does_not_poison_the_next() {
        let mut planner = FlakyPlanner {
            failures: vec![Error::missing_input("broken")],
            calls: 0,
        };

        let script = plan_script(
            &mut planner,
            &[batch(0, &[0]), batch(1, &[1])],
            &[],
            &RetryPolicy::immediate(1),
        );

        assert_eq!(script.len(), 2);
        assert_eq!(script[0].shot, ShotDescriptor::fallback(0));
        assert_eq!(script[1].shot.visual_query, "planned");
    }
}

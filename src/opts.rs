use crate::planner::RetryPolicy;

/// Options that control how the pipeline processes a source or a narration.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - other frontends (tests, batch jobs) can construct options programmatically
#[derive(Debug, Clone)]
pub struct PipelineOpts {
    /// Word-count target a context batch must reach before it may close.
    ///
    /// A batch still only closes on a true sentence end; this target alone
    /// never closes one.
    pub target_context_words: usize,

    /// Seconds added to every detected scene start during the flicker fix-up.
    pub flicker_offset_seconds: f32,

    /// How many of the most frequent anonymous persons are sent to the
    /// character identifier.
    pub character_limit: usize,

    /// Retry schedule for the narrative planner before a batch degrades to
    /// default descriptors.
    pub planner_retry: RetryPolicy,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            target_context_words: 60,
            flicker_offset_seconds: 0.2,
            character_limit: 15,
            planner_retry: RetryPolicy::default(),
        }
    }
}

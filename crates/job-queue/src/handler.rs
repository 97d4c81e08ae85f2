//! What a worker runs for each job.

use subburn_common::error::SubburnResult;
use subburn_cue_model::request::RenderInput;
use subburn_render_engine::RenderPipeline;

/// Executes one job attempt to completion.
///
/// Called on a blocking thread. `progress` takes percentages; the queue
/// keeps the stored value monotonic.
pub trait JobHandler: Send + Sync {
    fn handle(
        &self,
        job_id: &str,
        input: &RenderInput,
        progress: &dyn Fn(f64),
    ) -> SubburnResult<Vec<u8>>;
}

impl JobHandler for RenderPipeline {
    fn handle(
        &self,
        job_id: &str,
        input: &RenderInput,
        progress: &dyn Fn(f64),
    ) -> SubburnResult<Vec<u8>> {
        self.render(job_id, input, progress)
    }
}

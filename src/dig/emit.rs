//! Job emission shared by both diggers.

use crate::audit;
use crate::core::error::DispatchError;
use crate::core::job::ScanJob;
use crate::core::types::check_length;
use crate::job::JobQueue;
use crate::repository::{ContentProperty, PropertyLengths};

/// Counters collected while digging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigSummary {
    /// Nodes whose properties were inspected by a tree dig.
    pub nodes_visited: usize,
    /// Changed properties resolved by a change dig.
    pub properties_resolved: usize,
    /// Jobs handed to the queue.
    pub jobs_emitted: usize,
    /// Values skipped because they exceed the max length.
    pub values_skipped: usize,
}

/// Emits one job per qualifying value of `property`.
pub(crate) fn emit_jobs(
    jobs: &dyn JobQueue,
    property: &ContentProperty,
    max_length: i64,
    user_id: Option<&str>,
    summary: &mut DigSummary,
) -> Result<(), DispatchError> {
    match &property.lengths {
        PropertyLengths::Multiple(lengths) => {
            for (index, length) in lengths.iter().copied().enumerate() {
                let job = ScanJob::multi(&property.path, index, property.property_type).with_user_id(user_id);
                submit_if_fits(jobs, job, length, max_length, summary)?;
            }
        }
        PropertyLengths::Single(length) => {
            let job = ScanJob::single(&property.path, property.property_type).with_user_id(user_id);
            submit_if_fits(jobs, job, *length, max_length, summary)?;
        }
    }
    Ok(())
}

fn submit_if_fits(
    jobs: &dyn JobQueue,
    job: ScanJob,
    length: u64,
    max_length: i64,
    summary: &mut DigSummary,
) -> Result<(), DispatchError> {
    if !check_length(length, max_length) {
        audit::emit_value_skipped(&job.path, job.index, length, max_length);
        summary.values_skipped += 1;
        return Ok(());
    }
    let topic = job.topic();
    jobs.submit(&topic, job.to_attributes())?;
    audit::emit_job_submitted(&topic, &job.path, job.index, job.user_id.as_deref());
    summary.jobs_emitted += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PropertyType;
    use crate::job::MemoryJobQueue;

    #[test]
    fn test_multi_valued_lengths() {
        let queue = MemoryJobQueue::new();
        let property = ContentProperty {
            path: "/c/tags".into(),
            property_type: PropertyType::String,
            lengths: PropertyLengths::Multiple(vec![5, 50, 500]),
        };

        let mut summary = DigSummary::default();
        emit_jobs(&queue, &property, 100, Some("ed"), &mut summary).unwrap();

        assert_eq!(summary.jobs_emitted, 2);
        assert_eq!(summary.values_skipped, 1);
        let jobs = queue.take_all();
        assert_eq!(jobs[0].topic, "contentscan/scan/property/String");
        assert_eq!(jobs[0].attributes["index"], 0);
        assert_eq!(jobs[1].attributes["index"], 1);
        assert_eq!(jobs[1].attributes["userId"], "ed");
    }

    #[test]
    fn test_submission_failure_propagates() {
        let queue = MemoryJobQueue::new();
        queue.set_rejecting(true);
        let property = ContentProperty {
            path: "/c/data".into(),
            property_type: PropertyType::Binary,
            lengths: PropertyLengths::Single(1),
        };

        let mut summary = DigSummary::default();
        assert!(emit_jobs(&queue, &property, -1, None, &mut summary).is_err());
        assert_eq!(summary.jobs_emitted, 0);
    }
}

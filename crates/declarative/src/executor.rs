//! Plan execution - reconciles planned changes with bounded parallelism

use crate::context::OperationContext;
use crate::engine::Engine;
use crate::error::Error;
use crate::planner::{ExecutionPlan, PlannedChange};
use crate::types::{Action, ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called before the pending changes are applied
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting to apply a single change
    fn on_resource_start(&mut self, address: &str, description: &str);

    /// Called when a change completes
    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult);

    /// Called when every change has completed
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _address: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Per-address results of an execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteReport {
    /// Results in plan order
    pub results: Vec<(PlannedChange, ApplyResult)>,
    pub summary: ExecuteSummary,
}

impl ExecuteReport {
    fn push(&mut self, change: PlannedChange, result: ApplyResult) {
        self.summary.add_result(&result);
        self.results.push((change, result));
    }
}

/// Execute a plan with the given options and callbacks
///
/// Every address is handled by exactly one worker, so operations on one
/// tracked resource never overlap. A failure is recorded in the report and
/// does not stop the remaining changes.
pub fn execute<P, C>(
    engine: &Engine<'_>,
    ctx: &OperationContext,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let pending: Vec<&PlannedChange> = plan.pending().collect();
    let mut report = ExecuteReport::default();

    if pending.is_empty() {
        return Ok(report);
    }

    if opts.dry_run {
        for change in pending {
            report.push(
                change.clone(),
                ApplyResult::Skipped {
                    reason: "Dry run".into(),
                },
            );
        }
        return Ok(report);
    }

    let prompt = format!("Apply {} change(s)?", pending.len());
    if !confirm.confirm(&prompt)? {
        for change in pending {
            report.push(
                change.clone(),
                ApplyResult::Skipped {
                    reason: "Declined".into(),
                },
            );
        }
        return Ok(report);
    }

    progress.on_batch_start(pending.len());
    let results = if opts.jobs <= 1 || pending.len() == 1 {
        let mut results = Vec::with_capacity(pending.len());
        for change in &pending {
            progress.on_resource_start(&change.address, &change.description());
            let result = apply_change(engine, ctx, change);
            progress.on_resource_complete(&change.address, &result);
            results.push(result);
        }
        results
    } else {
        execute_parallel(engine, ctx, &pending, opts.jobs, progress)?
    };
    progress.on_batch_complete();

    for (change, result) in pending.into_iter().zip(results) {
        report.push(change.clone(), result);
    }
    Ok(report)
}

/// Execute changes in parallel using rayon, preserving plan order
fn execute_parallel<P: ProgressCallback>(
    engine: &Engine<'_>,
    ctx: &OperationContext,
    changes: &[&PlannedChange],
    jobs: usize,
    progress: &mut P,
) -> Result<Vec<ApplyResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    // Workers report as they go; the lock is held only for the callback
    let progress = Mutex::new(progress);

    Ok(pool.install(|| {
        changes
            .par_iter()
            .map(|change| {
                lock(&progress).on_resource_start(&change.address, &change.description());
                let result = apply_change(engine, ctx, change);
                lock(&progress).on_resource_complete(&change.address, &result);
                result
            })
            .collect()
    }))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply a single change
fn apply_change(
    engine: &Engine<'_>,
    ctx: &OperationContext,
    change: &PlannedChange,
) -> ApplyResult {
    match try_apply(engine, ctx, change) {
        Ok(result) => result,
        Err(e) => {
            log::error!("{}: {e}", change.address);
            ApplyResult::Failed {
                error: e.to_string(),
                needs_attention: e.category().requires_manual_intervention(),
            }
        }
    }
}

fn try_apply(
    engine: &Engine<'_>,
    ctx: &OperationContext,
    change: &PlannedChange,
) -> Result<ApplyResult, Error> {
    let kind = change.kind;
    let (desired, prior) = (change.desired.as_ref(), change.prior.as_ref());

    match (change.action, desired, prior) {
        (Action::NoChange, _, _) => Ok(ApplyResult::NoChange),
        (Action::Create, Some(desired), _) => {
            engine.create(ctx, kind, desired).map(ApplyResult::Created)
        }
        (Action::Update, Some(desired), Some(prior)) => engine
            .update(ctx, kind, desired, prior)
            .map(ApplyResult::Updated),
        (Action::Replace, Some(desired), Some(prior)) => {
            engine.delete(ctx, kind, prior)?;
            engine.create(ctx, kind, desired).map(ApplyResult::Replaced)
        }
        (Action::Delete, _, Some(prior)) => {
            engine.delete(ctx, kind, prior)?;
            Ok(ApplyResult::Deleted)
        }
        (action, _, _) => Err(Error::InvalidPlan {
            kind: kind.name.to_string(),
            message: format!("{action} of {} lacks the records it needs", change.address),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::fixtures::PROJECT;
    use crate::planner::ResourceEntry;
    use crate::record::AttributeRecord;
    use crate::remote::{MockRemote, Operation, RemoteEntity};
    use std::collections::BTreeSet;

    fn declared(name: &str) -> ResourceEntry {
        ResourceEntry::new(&PROJECT, name, AttributeRecord::new().with("name", name))
    }

    fn tracked(name: &str, id: &str) -> ResourceEntry {
        ResourceEntry::new(
            &PROJECT,
            name,
            AttributeRecord::new().with("id", id).with("name", name),
        )
    }

    #[derive(Default)]
    struct Recorder {
        started: usize,
        begun: Vec<String>,
        completed: Vec<String>,
        finished: bool,
    }

    impl ProgressCallback for Recorder {
        fn on_batch_start(&mut self, count: usize) {
            self.started = count;
        }
        fn on_resource_start(&mut self, address: &str, _description: &str) {
            self.begun.push(address.to_string());
        }
        fn on_resource_complete(&mut self, address: &str, _result: &ApplyResult) {
            assert!(self.begun.iter().any(|a| a == address));
            self.completed.push(address.to_string());
        }
        fn on_batch_complete(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let mock = MockRemote::new();
        let engine = Engine::new(&mock);
        let report = execute(
            &engine,
            &OperationContext::new(),
            &ExecutionPlan::new(),
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.total(), 0);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_execute_creates_and_deletes() {
        let mock = MockRemote::simulated();
        mock.set_entities(
            "project",
            vec![RemoteEntity::new().with("id", "p9").with("name", "old")],
        );
        let engine = Engine::new(&mock);
        let plan = ExecutionPlan::build(
            &[declared("a"), declared("b"), declared("c")],
            &[tracked("old", "p9")],
        );
        let mut progress = Recorder::default();

        let report = execute(
            &engine,
            &OperationContext::new(),
            &plan,
            &ExecuteOptions::default(),
            &mut progress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.created, 3);
        assert_eq!(report.summary.deleted, 1);
        assert!(report.summary.is_success());
        assert_eq!(progress.started, 4);
        assert_eq!(progress.completed.len(), 4);
        assert!(progress.finished);

        let names: BTreeSet<_> = mock
            .entities("project")
            .iter()
            .filter_map(|e| e.get_str("name").map(str::to_string))
            .collect();
        assert_eq!(names, BTreeSet::from(["a", "b", "c"].map(String::from)));

        // Plan order is kept even when run in parallel
        let addresses: Vec<_> = report.results.iter().map(|(c, _)| c.address.as_str()).collect();
        assert_eq!(addresses, vec!["project.a", "project.b", "project.c", "project.old"]);
    }

    #[test]
    fn test_parallel_workers_report_each_change() {
        let mock = MockRemote::simulated();
        let engine = Engine::new(&mock);
        let declared = ["a", "b", "c", "d", "e", "f"].map(declared);
        let plan = ExecutionPlan::build(&declared, &[]);
        let opts = ExecuteOptions {
            jobs: 4,
            ..Default::default()
        };
        let mut progress = Recorder::default();

        let report = execute(
            &engine,
            &OperationContext::new(),
            &plan,
            &opts,
            &mut progress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.created, 6);
        let begun: BTreeSet<_> = progress.begun.iter().cloned().collect();
        let completed: BTreeSet<_> = progress.completed.iter().cloned().collect();
        assert_eq!(progress.begun.len(), 6);
        assert_eq!(progress.completed.len(), 6);
        assert_eq!(begun, completed);
        assert!(begun.contains("project.f"));
    }

    #[test]
    fn test_dry_run_makes_no_calls() {
        let mock = MockRemote::new();
        let engine = Engine::new(&mock);
        let plan = ExecutionPlan::build(&[declared("a")], &[]);
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = execute(
            &engine,
            &OperationContext::new(),
            &plan,
            &opts,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, 1);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_declined_makes_no_calls() {
        let mock = MockRemote::new();
        let engine = Engine::new(&mock);
        let plan = ExecutionPlan::build(&[declared("a")], &[]);

        let report = execute(
            &engine,
            &OperationContext::new(),
            &plan,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, 1);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_failure_is_reported_not_fatal() {
        // No body and nothing listed: the create cannot be verified
        let mock = MockRemote::new();
        let engine = Engine::new(&mock);
        let plan = ExecutionPlan::build(&[declared("a")], &[]);
        let opts = ExecuteOptions {
            jobs: 1,
            ..Default::default()
        };

        let report = execute(
            &engine,
            &OperationContext::new(),
            &plan,
            &opts,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(report.summary.failed, 1);
        assert!(matches!(
            report.results[0].1,
            ApplyResult::Failed {
                needs_attention: true,
                ..
            }
        ));
        assert_eq!(mock.call_count(Operation::Create), 1);
    }
}

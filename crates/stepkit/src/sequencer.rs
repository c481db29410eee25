//! Step sequencer - drives lists of steps through one lifecycle verb
//!
//! All verbs run strictly sequentially, abort on the first failing task,
//! and finalize every task that was at least validated.

use crate::error::Result;
use crate::finalize::FinalizeScope;
use crate::task::{Step, Task};
use std::fmt;

/// Lifecycle verb to run across a list of steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Validate,
    Plan,
    Apply,
    Destroy,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `verb` over `steps`
pub fn execute(verb: Verb, steps: &[Step]) -> Result<()> {
    match verb {
        Verb::Validate => execute_validate(steps),
        Verb::Plan => execute_plan(steps),
        Verb::Apply => execute_apply(steps),
        Verb::Destroy => execute_destroy(steps),
    }
}

/// Validate every task in step-then-task order
pub fn execute_validate(steps: &[Step]) -> Result<()> {
    execute_forward(steps, Verb::Validate, |_| Ok(()))
}

/// Validate then plan every task in step-then-task order
pub fn execute_plan(steps: &[Step]) -> Result<()> {
    execute_forward(steps, Verb::Plan, |t| t.plan())
}

/// Validate then apply every task in step-then-task order
pub fn execute_apply(steps: &[Step]) -> Result<()> {
    execute_forward(steps, Verb::Apply, |t| t.apply())
}

fn execute_forward<F>(steps: &[Step], verb: Verb, then: F) -> Result<()>
where
    F: Fn(&dyn Task) -> Result<()>,
{
    let mut scope = FinalizeScope::new();

    let outcome = (|| -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            log::debug!("{verb}: step {}/{}", i + 1, steps.len());
            for task in step.tasks() {
                scope.register(task);
                log::debug!("{verb}: validate {}", task.name());
                task.validate()?;
                if verb != Verb::Validate {
                    log::debug!("{verb}: {}", task.name());
                    then(task)?;
                }
            }
        }
        Ok(())
    })();

    scope.close(outcome)
}

/// Tear down every task, keeping connectivity alive until the end
///
/// 1. Connectivity-bootstrap tasks (forward order) are validated and applied
///    so the capability resources behind them are reachable again.
/// 2. Every other task is validated and destroyed, steps in reverse order and
///    tasks in declared order within a step.
/// 3. Only if everything above succeeded, connectivity tasks are destroyed in
///    reverse order of reconnection.
///
/// Every task that was validated is finalized, whatever the outcome.
pub fn execute_destroy(steps: &[Step]) -> Result<()> {
    let mut scope = FinalizeScope::new();

    let outcome = (|| -> Result<()> {
        let mut connected: Vec<&dyn Task> = Vec::new();

        for task in steps.iter().flat_map(Step::tasks) {
            if !task.is_connectivity_bootstrap() {
                continue;
            }
            scope.register(task);
            log::debug!("destroy: reconnect {}", task.name());
            task.validate()?;
            task.apply()?;
            connected.push(task);
        }

        for step in steps.iter().rev() {
            for task in step.tasks() {
                if task.is_connectivity_bootstrap() {
                    continue;
                }
                scope.register(task);
                log::debug!("destroy: validate {}", task.name());
                task.validate()?;
                log::debug!("destroy: {}", task.name());
                task.destroy()?;
            }
        }

        for task in connected.into_iter().rev() {
            log::debug!("destroy: disconnect {}", task.name());
            task.destroy()?;
        }

        Ok(())
    })();

    scope.close(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::task::{BoxedTask, TaskOptions};
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Task that records every lifecycle call as "<name>.<verb>"
    #[derive(Debug)]
    struct Recording {
        options: TaskOptions,
        log: CallLog,
        fail_on: Option<&'static str>,
    }

    impl Recording {
        fn new(name: &str, source: &str, log: &CallLog) -> Self {
            Self {
                options: TaskOptions::new(name).source(source),
                log: Arc::clone(log),
                fail_on: None,
            }
        }

        fn failing(mut self, verb: &'static str) -> Self {
            self.fail_on = Some(verb);
            self
        }

        fn record(&self, verb: &'static str) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}.{}", self.options.name, verb));
            if self.fail_on == Some(verb) {
                return Err(TaskError::ProcessFailed {
                    task: self.options.name.clone(),
                    command: format!("terraform {verb}"),
                    status: exit_status(1),
                });
            }
            Ok(())
        }
    }

    impl Task for Recording {
        fn options(&self) -> &TaskOptions {
            &self.options
        }
        fn validate(&self) -> Result<()> {
            self.record("validate")
        }
        fn plan(&self) -> Result<()> {
            self.record("plan")
        }
        fn apply(&self) -> Result<()> {
            self.record("apply")
        }
        fn destroy(&self) -> Result<()> {
            self.record("destroy")
        }
        fn finalize(&self) -> Result<()> {
            self.record("finalize")
        }
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }

    const MODULE: &str = "https://github.com/w-h-a/kubernetes-do.git";
    const KUBECONFIG: &str = "https://github.com/w-h-a/kubeconfig.git";

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn position(calls: &[String], call: &str) -> usize {
        calls
            .iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("{call} not in {calls:?}"))
    }

    #[test]
    fn test_validate_runs_in_order_and_finalizes_all() {
        let log = CallLog::default();
        let steps = vec![
            Step::new(vec![
                Box::new(Recording::new("a", MODULE, &log)),
                Box::new(Recording::new("b", MODULE, &log)),
            ]),
            Step::single(Recording::new("c", MODULE, &log)),
        ];

        execute_validate(&steps).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.validate",
                "b.validate",
                "c.validate",
                "c.finalize",
                "b.finalize",
                "a.finalize",
            ]
        );
    }

    #[test]
    fn test_validate_failure_stops_and_finalizes_once() {
        let log = CallLog::default();
        let steps = vec![
            Step::single(Recording::new("one", MODULE, &log).failing("validate")),
            Step::single(Recording::new("two", MODULE, &log)),
        ];

        let err = execute_validate(&steps).unwrap_err();
        assert!(matches!(err, TaskError::ProcessFailed { ref task, .. } if task == "one"));

        let calls = calls(&log);
        assert_eq!(calls, vec!["one.validate", "one.finalize"]);
        assert!(!calls.contains(&"two.validate".to_string()));
    }

    #[test]
    fn test_validate_failure_midway_finalizes_validated_tasks() {
        let log = CallLog::default();
        let steps = vec![
            Step::single(Recording::new("a", MODULE, &log)),
            Step::new(vec![
                Box::new(Recording::new("b", MODULE, &log).failing("validate")),
                Box::new(Recording::new("c", MODULE, &log)),
            ]),
        ];

        execute_validate(&steps).unwrap_err();

        assert_eq!(
            calls(&log),
            vec!["a.validate", "b.validate", "b.finalize", "a.finalize"]
        );
    }

    #[test]
    fn test_plan_validates_then_plans_each_task() {
        let log = CallLog::default();
        let steps = vec![
            Step::single(Recording::new("a", MODULE, &log)),
            Step::single(Recording::new("b", MODULE, &log)),
        ];

        execute(Verb::Plan, &steps).unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "a.validate",
                "a.plan",
                "b.validate",
                "b.plan",
                "b.finalize",
                "a.finalize",
            ]
        );
    }

    #[test]
    fn test_apply_failure_short_circuits() {
        let log = CallLog::default();
        let steps = vec![
            Step::single(Recording::new("a", MODULE, &log).failing("apply")),
            Step::single(Recording::new("b", MODULE, &log)),
        ];

        execute_apply(&steps).unwrap_err();

        assert_eq!(calls(&log), vec!["a.validate", "a.apply", "a.finalize"]);
    }

    #[test]
    fn test_destroy_keeps_connectivity_until_last() {
        let log = CallLog::default();
        let steps = vec![
            Step::new(vec![
                Box::new(Recording::new("conn", KUBECONFIG, &log)),
                Box::new(Recording::new("s1", MODULE, &log)),
            ]),
            Step::single(Recording::new("s2", MODULE, &log)),
            Step::single(Recording::new("s3", MODULE, &log)),
        ];

        execute_destroy(&steps).unwrap();

        let destroys: Vec<String> = calls(&log)
            .into_iter()
            .filter(|c| c.ends_with(".apply") || c.ends_with(".destroy"))
            .collect();
        assert_eq!(
            destroys,
            vec![
                "conn.apply",
                "s3.destroy",
                "s2.destroy",
                "s1.destroy",
                "conn.destroy",
            ]
        );

        let calls = calls(&log);
        for name in ["conn", "s1", "s2", "s3"] {
            let finalizes = calls
                .iter()
                .filter(|c| **c == format!("{name}.finalize"))
                .count();
            assert_eq!(finalizes, 1, "{name} finalized {finalizes} times");
        }
        assert!(position(&calls, "conn.finalize") > position(&calls, "conn.destroy"));
    }

    #[test]
    fn test_destroy_connectivity_ordering_holds_for_any_layout() {
        let log = CallLog::default();
        // Connectivity in the last step and in the middle of a step
        let steps = vec![
            Step::single(Recording::new("s1", MODULE, &log)),
            Step::new(vec![
                Box::new(Recording::new("s2a", MODULE, &log)),
                Box::new(Recording::new("conn-a", KUBECONFIG, &log)),
                Box::new(Recording::new("s2b", MODULE, &log)),
            ]),
            Step::single(Recording::new("conn-b", KUBECONFIG, &log)),
        ];

        execute_destroy(&steps).unwrap();

        let calls = calls(&log);
        let last_apply = ["conn-a.apply", "conn-b.apply"]
            .iter()
            .map(|c| position(&calls, c))
            .max()
            .unwrap();
        let first_conn_destroy = ["conn-a.destroy", "conn-b.destroy"]
            .iter()
            .map(|c| position(&calls, c))
            .min()
            .unwrap();

        for name in ["s1", "s2a", "s2b"] {
            let destroyed = position(&calls, &format!("{name}.destroy"));
            assert!(last_apply < destroyed);
            assert!(destroyed < first_conn_destroy);
        }

        // Steps reversed, tasks in declared order
        assert!(position(&calls, "s2a.destroy") < position(&calls, "s2b.destroy"));
        assert!(position(&calls, "s2b.destroy") < position(&calls, "s1.destroy"));
        // Disconnect in reverse order of reconnect
        assert!(position(&calls, "conn-b.destroy") < position(&calls, "conn-a.destroy"));
    }

    /// Steps from groups of task indices; task `i` is named `t<i>`
    fn build(
        groups: &[Vec<usize>],
        is_conn: &dyn Fn(usize) -> bool,
        failing: Option<usize>,
        log: &CallLog,
    ) -> Vec<Step> {
        groups
            .iter()
            .map(|group| {
                let tasks = group
                    .iter()
                    .map(|&i| {
                        let source = if is_conn(i) { KUBECONFIG } else { MODULE };
                        let task = Recording::new(&format!("t{i}"), source, log);
                        let task = if failing == Some(i) {
                            task.failing("destroy")
                        } else {
                            task
                        };
                        Box::new(task) as BoxedTask
                    })
                    .collect();
                Step::new(tasks)
            })
            .collect()
    }

    fn count(seen: &[String], call: &str) -> usize {
        seen.iter().filter(|c| *c == call).count()
    }

    #[test]
    fn test_destroy_ordering_for_every_layout() {
        const N: usize = 4;

        // Every choice of connectivity tasks, and every way to cut the
        // task sequence into steps
        for conn_mask in 0..(1u32 << N) {
            for cuts in 0..(1u32 << (N - 1)) {
                let is_conn = |i: usize| conn_mask & (1 << i) != 0;

                let mut groups: Vec<Vec<usize>> = vec![Vec::new()];
                for i in 0..N {
                    if let Some(group) = groups.last_mut() {
                        group.push(i);
                    }
                    if i + 1 < N && cuts & (1 << i) != 0 {
                        groups.push(Vec::new());
                    }
                }

                let conns: Vec<usize> = (0..N).filter(|&i| is_conn(i)).collect();
                let teardown: Vec<usize> = groups
                    .iter()
                    .rev()
                    .flatten()
                    .copied()
                    .filter(|&i| !is_conn(i))
                    .collect();

                let mut expected: Vec<String> =
                    conns.iter().map(|i| format!("t{i}.apply")).collect();
                expected.extend(teardown.iter().map(|i| format!("t{i}.destroy")));
                expected.extend(conns.iter().rev().map(|i| format!("t{i}.destroy")));

                let log = CallLog::default();
                execute_destroy(&build(&groups, &is_conn, None, &log)).unwrap();

                let seen = calls(&log);
                let actions: Vec<String> = seen
                    .iter()
                    .filter(|c| c.ends_with(".apply") || c.ends_with(".destroy"))
                    .cloned()
                    .collect();
                assert_eq!(
                    actions, expected,
                    "connectivity {conn_mask:04b}, cuts {cuts:03b}"
                );
                for i in 0..N {
                    assert_eq!(count(&seen, &format!("t{i}.finalize")), 1);
                }

                // A failed teardown never removes connectivity
                if let Some(&first) = teardown.first() {
                    let log = CallLog::default();
                    execute_destroy(&build(&groups, &is_conn, Some(first), &log)).unwrap_err();

                    let seen = calls(&log);
                    for &c in &conns {
                        assert_eq!(count(&seen, &format!("t{c}.destroy")), 0);
                    }
                    for i in 0..N {
                        let validated = count(&seen, &format!("t{i}.validate"));
                        assert_eq!(count(&seen, &format!("t{i}.finalize")), validated);
                    }
                }
            }
        }
    }

    #[test]
    fn test_destroy_failure_keeps_connectivity_and_finalizes() {
        let log = CallLog::default();
        let steps = vec![
            Step::new(vec![
                Box::new(Recording::new("conn", KUBECONFIG, &log)),
                Box::new(Recording::new("s1", MODULE, &log)),
            ]),
            Step::single(Recording::new("s2", MODULE, &log).failing("destroy")),
        ];

        execute_destroy(&steps).unwrap_err();

        let calls = calls(&log);
        assert!(!calls.contains(&"conn.destroy".to_string()));
        assert!(!calls.contains(&"s1.validate".to_string()));
        assert!(calls.contains(&"s2.finalize".to_string()));
        assert!(calls.contains(&"conn.finalize".to_string()));
    }

    #[test]
    fn test_destroy_reconnect_failure_aborts_before_teardown() {
        let log = CallLog::default();
        let steps = vec![
            Step::single(Recording::new("conn", KUBECONFIG, &log).failing("apply")),
            Step::single(Recording::new("s1", MODULE, &log)),
        ];

        execute_destroy(&steps).unwrap_err();

        assert_eq!(
            calls(&log),
            vec!["conn.validate", "conn.apply", "conn.finalize"]
        );
    }

    #[test]
    fn test_empty_steps_are_noops() {
        let steps = vec![Step::default(), Step::default()];
        for verb in [Verb::Validate, Verb::Plan, Verb::Apply, Verb::Destroy] {
            execute(verb, &steps).unwrap();
        }
    }
}

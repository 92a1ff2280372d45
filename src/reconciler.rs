use crate::schemas::task::VideoTask;
use crate::store::AppStore;
use std::collections::HashMap;

/// Returns true when at least one task known in `previous` has moved from an
/// active status to a terminal one in `next`.
///
/// Tasks without a previous record are never transitions, and tasks that
/// vanished from `next` are ignored.
pub fn has_terminal_transition(previous: &[VideoTask], next: &[VideoTask]) -> bool {
    let before: HashMap<&str, &VideoTask> = previous
        .iter()
        .map(|task| (task.id.as_str(), task))
        .collect();

    next.iter().any(|task| match before.get(task.id.as_str()) {
        Some(old) => task.is_terminal() && !old.is_terminal(),
        None => false,
    })
}

/// Applies fetched snapshots to the store and remembers the last one for
/// the next diff.
#[derive(Debug, Default)]
pub struct Reconciler {
    previous: Vec<VideoTask>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> &[VideoTask] {
        &self.previous
    }

    /// Replaces the store with `fetched` and reports whether the credit
    /// balance needs refreshing.
    pub fn apply(&mut self, fetched: Vec<VideoTask>, store: &AppStore) -> bool {
        let refresh_credits = has_terminal_transition(&self.previous, &fetched);
        store.replace_all(fetched.clone());
        self.previous = fetched;
        refresh_credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::task_status::TaskStatus;

    fn task(id: &str, status: TaskStatus) -> VideoTask {
        VideoTask {
            status,
            ..VideoTask::pending(id)
        }
    }

    #[test]
    fn completion_triggers_single_refresh() {
        let store = AppStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.apply(vec![task("a", TaskStatus::Processing)], &store);

        let done = VideoTask {
            video_url: Some("x".into()),
            ..task("a", TaskStatus::Completed)
        };
        assert!(reconciler.apply(vec![done.clone()], &store));
        assert_eq!(store.tasks(), vec![done]);
    }

    #[test]
    fn new_task_is_not_a_transition() {
        let store = AppStore::new();
        let mut reconciler = Reconciler::new();
        assert!(!reconciler.apply(vec![task("b", TaskStatus::Pending)], &store));
        assert_eq!(store.tasks()[0].id, "b");

        // Even a task that first shows up already finished.
        assert!(!reconciler.apply(
            vec![
                task("b", TaskStatus::Pending),
                task("c", TaskStatus::Completed)
            ],
            &store
        ));
    }

    #[test]
    fn same_snapshot_twice_refreshes_once() {
        let store = AppStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.apply(vec![task("a", TaskStatus::Queued)], &store);

        let snapshot = vec![task("a", TaskStatus::Failed)];
        assert!(reconciler.apply(snapshot.clone(), &store));
        assert!(!reconciler.apply(snapshot, &store));
    }

    #[test]
    fn many_transitions_still_one_refresh() {
        let previous = vec![
            task("a", TaskStatus::Processing),
            task("b", TaskStatus::Pending),
            task("c", TaskStatus::Completed),
        ];
        let next = vec![
            task("a", TaskStatus::Completed),
            task("b", TaskStatus::Failed),
            task("c", TaskStatus::Completed),
        ];
        assert!(has_terminal_transition(&previous, &next));
    }

    #[test]
    fn active_to_active_and_disappearance_are_ignored() {
        let previous = vec![
            task("a", TaskStatus::Pending),
            task("gone", TaskStatus::Processing),
        ];
        let next = vec![task("a", TaskStatus::Processing)];
        assert!(!has_terminal_transition(&previous, &next));
    }

    #[test]
    fn matches_reference_predicate_over_all_status_pairs() {
        let statuses = [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ];
        for before in statuses {
            for after in statuses {
                let expected = after.is_terminal() && !before.is_terminal();
                assert_eq!(
                    has_terminal_transition(&[task("t", before)], &[task("t", after)]),
                    expected,
                    "{before} -> {after}"
                );
            }
        }
    }
}

use crate::schemas::generate::FormConfig;
use crate::schemas::task::VideoTask;
use crate::schemas::task_status::TaskStatus;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct AppState {
    tasks: Vec<VideoTask>,
    form: FormConfig,
    credits: Option<i64>,
    is_generating: bool,
}

/// Client-side application state: the task queue, the generation form and
/// the credit balance.
///
/// The store is created once by the composition root and handed out by
/// cloning. Task list mutations publish on two watch channels: a revision
/// counter for views, and the "any task still active" flag the poller keys
/// its timer on.
#[derive(Clone)]
pub struct AppStore {
    state: Arc<Mutex<AppState>>,
    revision: Arc<watch::Sender<u64>>,
    active: Arc<watch::Sender<bool>>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        let (active, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            revision: Arc::new(revision),
            active: Arc::new(active),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Tasks ─────────────────────────

    /// Overwrites the queue with an authoritative snapshot. Tasks absent
    /// from `tasks` are dropped; nothing is merged by id.
    pub fn replace_all(&self, tasks: Vec<VideoTask>) {
        self.mutate_tasks(|queue| *queue = tasks);
    }

    /// Optimistic insert of a task that the backend has just accepted.
    pub fn append(&self, task: VideoTask) {
        self.mutate_tasks(|queue| queue.push(task));
    }

    /// User dismissal of a single task.
    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        self.mutate_tasks(|queue| {
            let before = queue.len();
            queue.retain(|task| task.id != id);
            removed = queue.len() != before;
        });
        removed
    }

    /// Removes every completed task. Failed tasks stay visible until dismissed.
    pub fn clear_completed(&self) {
        self.mutate_tasks(|queue| queue.retain(|task| task.status != TaskStatus::Completed));
    }

    pub fn tasks(&self) -> Vec<VideoTask> {
        self.lock().tasks.clone()
    }

    pub fn task(&self, id: &str) -> Option<VideoTask> {
        self.lock().tasks.iter().find(|task| task.id == id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .tasks
            .iter()
            .filter(|task| task.status.is_active())
            .count()
    }

    pub fn has_active_tasks(&self) -> bool {
        self.active_count() > 0
    }

    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn mutate_tasks(&self, apply: impl FnOnce(&mut Vec<VideoTask>)) {
        let has_active = {
            let mut state = self.lock();
            apply(&mut state.tasks);
            state.tasks.iter().any(|task| task.status.is_active())
        };
        self.revision.send_modify(|rev| *rev += 1);
        self.active.send_if_modified(|current| {
            let changed = *current != has_active;
            *current = has_active;
            changed
        });
    }

    // ── Form ──────────────────────────

    pub fn form(&self) -> FormConfig {
        self.lock().form.clone()
    }

    pub fn update_form(&self, update: impl FnOnce(&mut FormConfig)) {
        update(&mut self.lock().form);
    }

    pub fn reset_form(&self) {
        self.lock().form = FormConfig::default();
    }

    // ── UI ────────────────────────────

    pub fn credits(&self) -> Option<i64> {
        self.lock().credits
    }

    pub fn set_credits(&self, credits: Option<i64>) {
        self.lock().credits = credits;
    }

    pub fn is_generating(&self) -> bool {
        self.lock().is_generating
    }

    /// Sets the flag and returns its previous value.
    pub fn set_generating(&self, value: bool) -> bool {
        std::mem::replace(&mut self.lock().is_generating, value)
    }
}

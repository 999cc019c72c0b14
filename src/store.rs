// Task list store: in-memory list, draft input and edit session, written
// through to a slot after every mutation

use crate::slots::{Slots, validate_key};
use crate::task::{self, EditSession, Task};
use eyre::{Result, eyre};
use tracing::{debug, info};

/// Slot key used when none is configured
pub const DEFAULT_KEY: &str = "tasks";

/// Owns the task list and keeps its slot in sync
///
/// Every operation that touches the list writes the whole list back to the
/// slot exactly once, after the in-memory update. A failed write is returned
/// to the caller; the in-memory change is kept.
pub struct TaskListStore<S: Slots> {
    slots: S,
    key: String,
    tasks: Vec<Task>,
    draft_input: String,
    edit_session: Option<EditSession>,
}

impl<S: Slots> TaskListStore<S> {
    /// Load the list stored under [`DEFAULT_KEY`]
    pub fn open(slots: S) -> Result<Self> {
        Self::open_with_key(slots, DEFAULT_KEY)
    }

    /// Load the list stored under `key`
    ///
    /// Nothing stored yields an empty list. Malformed content is tolerated
    /// (see [`task::decode`]); only a failing backend read is an error.
    pub fn open_with_key(slots: S, key: &str) -> Result<Self> {
        validate_key(key)?;

        let tasks = match slots.get(key)? {
            Some(blob) => task::decode(&blob),
            None => {
                debug!(key, "Nothing persisted yet, starting empty");
                Vec::new()
            }
        };

        info!(key, count = tasks.len(), "Opened task list");

        Ok(Self {
            slots,
            key: key.to_string(),
            tasks,
            draft_input: String::new(),
            edit_session: None,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn draft_input(&self) -> &str {
        &self.draft_input
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.edit_session.as_ref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Consume the store, handing back its backend
    pub fn into_slots(self) -> S {
        self.slots
    }

    /// Find the single task whose id starts with `prefix`
    pub fn resolve_id(&self, prefix: &str) -> Result<&str> {
        if prefix.is_empty() {
            return Err(eyre!("Task id cannot be empty"));
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(t), None) => Ok(&t.id),
            (None, _) => Err(eyre!("No task matches id {}", prefix)),
            (Some(_), Some(_)) => Err(eyre!("Task id {} is ambiguous", prefix)),
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub fn set_draft_input(&mut self, text: impl Into<String>) {
        self.draft_input = text.into();
    }

    /// Append the trimmed draft as a new task and clear the draft
    ///
    /// Returns the new id, or `None` (without writing) when the draft is blank.
    pub fn add_task(&mut self) -> Result<Option<String>> {
        let text = self.draft_input.trim();
        if text.is_empty() {
            debug!("Blank draft, nothing to add");
            return Ok(None);
        }

        let task = Task::new(text);
        let id = task.id.clone();
        self.tasks.push(task);
        self.draft_input.clear();

        debug!(id = %id, "Added task");
        self.persist()?;
        Ok(Some(id))
    }

    /// Remove the task with `id`, if any
    ///
    /// An edit session on that task is left in place; committing it later
    /// changes nothing.
    pub fn delete_task(&mut self, id: &str) -> Result<()> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);

        if self.tasks.len() == before {
            debug!(id, "Delete: no such task");
        } else {
            debug!(id, "Deleted task");
        }

        self.persist()
    }

    /// Start editing `id` with `current_text` as the draft, dropping any
    /// previous unsaved session
    pub fn begin_edit(&mut self, id: impl Into<String>, current_text: impl Into<String>) {
        let session = EditSession {
            id: id.into(),
            draft: current_text.into(),
        };
        if let Some(prev) = self.edit_session.replace(session) {
            debug!(id = %prev.id, "Discarded unsaved edit");
        }
    }

    pub fn update_edit_draft(&mut self, text: impl Into<String>) {
        match self.edit_session.as_mut() {
            Some(session) => session.draft = text.into(),
            None => debug!("No edit in progress, ignoring draft update"),
        }
    }

    /// Write the session draft into its task and end the session
    ///
    /// The draft is not validated; an empty draft empties the task text.
    pub fn commit_edit(&mut self) -> Result<()> {
        let Some(session) = self.edit_session.take() else {
            debug!("No edit in progress, nothing to commit");
            return Ok(());
        };

        match self.tasks.iter_mut().find(|t| t.id == session.id) {
            Some(task) => {
                task.text = session.draft;
                debug!(id = %session.id, "Committed edit");
            }
            None => debug!(id = %session.id, "Edited task no longer exists"),
        }

        self.persist()
    }

    pub fn toggle_done(&mut self, id: &str) -> Result<()> {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.done = !task.done;
                debug!(id, done = task.done, "Toggled task");
            }
            None => debug!(id, "Toggle: no such task"),
        }

        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        let blob = task::encode(&self.tasks)?;
        self.slots.set(&self.key, &blob)?;
        debug!(key = %self.key, count = self.tasks.len(), "Persisted task list");
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque task identifier, stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds `{name}-{size}-{last_modified}-{created_ms}`, suffixed with `-{n}`
/// while `taken` reports a collision.
pub fn generate_task_id(
    name: &str,
    size: u64,
    last_modified: u64,
    taken: impl Fn(&TaskId) -> bool,
) -> TaskId {
    let created_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let base = format!("{}-{}-{}-{}", name, size, last_modified, created_ms);
    let mut id = TaskId(base.clone());
    let mut n = 1u32;
    while taken(&id) {
        id = TaskId(format!("{}-{}", base, n));
        n += 1;
    }
    id
}

//! Running processes, read from `/proc/<pid>/comm`

use crate::collector::{CollectError, Collector};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ProcessList {
    proc_root: PathBuf,
}

impl ProcessList {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Default for ProcessList {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl Collector for ProcessList {
    fn name(&self) -> &str {
        "process_statistics"
    }

    fn collect(&self) -> Result<Value, CollectError> {
        let entries =
            std::fs::read_dir(&self.proc_root).map_err(|e| CollectError::io(&self.proc_root, e))?;

        let mut processes: Vec<(u32, String)> = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let comm_path = entry.path().join("comm");
            match std::fs::read_to_string(&comm_path) {
                Ok(comm) => processes.push((pid, comm.trim_end().to_string())),
                // Exited between listing and reading.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(CollectError::io(comm_path, err)),
            }
        }
        processes.sort_by_key(|(pid, _)| *pid);

        let list: Vec<Value> = processes
            .into_iter()
            .map(|(pid, command)| json!({ "process_id": pid, "command": command }))
            .collect();
        Ok(json!({ "count": list.len(), "processes": list }))
    }
}

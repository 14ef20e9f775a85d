//! Network interfaces, read from `/sys/class/net`

use crate::collector::{CollectError, Collector};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct NetworkInterfaces {
    sys_class_net: PathBuf,
}

impl NetworkInterfaces {
    pub fn new(sys_class_net: impl Into<PathBuf>) -> Self {
        Self {
            sys_class_net: sys_class_net.into(),
        }
    }
}

impl Default for NetworkInterfaces {
    fn default() -> Self {
        Self::new("/sys/class/net")
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_counter(path: &Path) -> Value {
    read_trimmed(path)
        .and_then(|s| s.parse::<u64>().ok())
        .map_or(Value::Null, Value::from)
}

impl Collector for NetworkInterfaces {
    fn name(&self) -> &str {
        "network_statistics"
    }

    fn collect(&self) -> Result<Value, CollectError> {
        let entries = std::fs::read_dir(&self.sys_class_net)
            .map_err(|e| CollectError::io(&self.sys_class_net, e))?;

        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        let interfaces: Vec<Value> = names
            .into_iter()
            .map(|name| {
                let dir = self.sys_class_net.join(&name);
                json!({
                    "name": name,
                    "operstate": read_trimmed(&dir.join("operstate")),
                    "rx_bytes": read_counter(&dir.join("statistics/rx_bytes")),
                    "tx_bytes": read_counter(&dir.join("statistics/tx_bytes")),
                })
            })
            .collect();
        Ok(json!({ "interfaces": interfaces }))
    }
}

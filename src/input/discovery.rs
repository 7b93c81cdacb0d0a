//! Keyboard discovery through the evdev device nodes
//!
//! Anything exposing `EV_KEY` with a letter row and Enter is treated as a
//! keyboard, the same set udev tags with `ID_INPUT_KEYBOARD=1`.

use std::io;
use std::path::{Path, PathBuf};

use evdev::{Device, EventType, Key};
use tracing::{debug, warn};

const INPUT_DIR: &str = "/dev/input";

/// Errors enumerating keyboards
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("cannot enumerate {dir}")]
    Enumerate {
        dir: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("no keyboard devices found")]
    NoKeyboards,
}

/// A physical keyboard node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardInfo {
    pub path: PathBuf,
    pub name: String,
}

/// Keyboards accepted up to the capacity, plus the ones left out
#[derive(Debug, Default)]
pub struct Discovery {
    pub accepted: Vec<KeyboardInfo>,
    pub ignored: Vec<KeyboardInfo>,
}

/// Enumerate keyboards, skipping any device named `exclude_name`
pub fn discover_keyboards(capacity: usize, exclude_name: &str) -> Result<Discovery, DiscoveryError> {
    std::fs::read_dir(INPUT_DIR).map_err(|source| DiscoveryError::Enumerate {
        dir: INPUT_DIR,
        source,
    })?;

    let mut found: Vec<KeyboardInfo> = evdev::enumerate()
        .filter_map(|(path, dev)| {
            let name = dev.name().unwrap_or_default().to_string();
            if name == exclude_name || !is_keyboard(&dev) {
                debug!(?path, %name, "skipping input device");
                return None;
            }
            Some(KeyboardInfo { path, name })
        })
        .collect();
    sort_by_node_number(&mut found);

    if found.is_empty() {
        return Err(DiscoveryError::NoKeyboards);
    }

    let discovery = limit_to_capacity(found, capacity);
    if !discovery.ignored.is_empty() {
        let ignored: Vec<&Path> = discovery.ignored.iter().map(|k| k.path.as_path()).collect();
        warn!(
            capacity,
            count = ignored.len(),
            ?ignored,
            "too many keyboards, ignoring the rest"
        );
    }

    Ok(discovery)
}

/// Order keyboards by the `N` of their `eventN` node, so `event2` precedes
/// `event10`. Nodes without that form go last, by path.
pub fn sort_by_node_number(found: &mut [KeyboardInfo]) {
    found.sort_by(|a, b| {
        let key = |k: &KeyboardInfo| node_number(&k.path).unwrap_or(u32::MAX);
        key(a).cmp(&key(b)).then_with(|| a.path.cmp(&b.path))
    });
}

fn node_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Keep the first `capacity` keyboards
pub fn limit_to_capacity(mut found: Vec<KeyboardInfo>, capacity: usize) -> Discovery {
    let ignored = if found.len() > capacity {
        found.split_off(capacity)
    } else {
        Vec::new()
    };
    Discovery {
        accepted: found,
        ignored,
    }
}

fn is_keyboard(dev: &Device) -> bool {
    if !dev.supported_events().contains(EventType::KEY) {
        return false;
    }
    dev.supported_keys()
        .map(|keys| {
            [Key::KEY_A, Key::KEY_Q, Key::KEY_Z, Key::KEY_ENTER]
                .into_iter()
                .all(|k| keys.contains(k))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyboards(n: usize) -> Vec<KeyboardInfo> {
        (0..n)
            .map(|i| KeyboardInfo {
                path: PathBuf::from(format!("/dev/input/event{i}")),
                name: format!("kbd{i}"),
            })
            .collect()
    }

    #[test]
    fn test_capacity_truncates_excess() {
        let discovery = limit_to_capacity(keyboards(20), 16);
        assert_eq!(discovery.accepted.len(), 16);
        assert_eq!(discovery.ignored.len(), 4);
        assert_eq!(discovery.accepted[15].path, PathBuf::from("/dev/input/event15"));
        assert_eq!(discovery.ignored[0].path, PathBuf::from("/dev/input/event16"));
    }

    #[test]
    fn test_under_capacity_keeps_all() {
        let discovery = limit_to_capacity(keyboards(3), 16);
        assert_eq!(discovery.accepted.len(), 3);
        assert!(discovery.ignored.is_empty());
    }

    #[test]
    fn test_exactly_capacity_keeps_all() {
        let discovery = limit_to_capacity(keyboards(16), 16);
        assert_eq!(discovery.accepted.len(), 16);
        assert!(discovery.ignored.is_empty());
    }

    #[test]
    fn test_sort_uses_node_number_not_string_order() {
        let mut found: Vec<KeyboardInfo> = ["event10", "by-id-kbd", "event2", "event1"]
            .iter()
            .map(|node| KeyboardInfo {
                path: Path::new("/dev/input").join(node),
                name: node.to_string(),
            })
            .collect();

        sort_by_node_number(&mut found);

        let names: Vec<&str> = found.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["event1", "event2", "event10", "by-id-kbd"]);
    }

    #[test]
    fn test_truncation_keeps_lowest_numbered_nodes() {
        let mut found = keyboards(12);
        found.reverse();
        sort_by_node_number(&mut found);

        let discovery = limit_to_capacity(found, 3);
        let accepted: Vec<&str> = discovery.accepted.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(accepted, ["kbd0", "kbd1", "kbd2"]);
        assert_eq!(discovery.ignored.last().unwrap().name, "kbd11");
    }
}

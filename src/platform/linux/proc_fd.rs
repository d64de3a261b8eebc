//! File-descriptor scanning under `/proc/<pid>/fd`.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Numeric entries of a `/proc`-style directory, ascending.
pub fn list_pids(proc_root: &Path) -> Result<Vec<u32>> {
    let entries = fs::read_dir(proc_root)
        .with_context(|| format!("Failed to read {}", proc_root.display()))?;

    let mut pids: Vec<u32> = entries
        .flatten()
        .filter_map(|e| e.file_name().to_string_lossy().parse::<u32>().ok())
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Link targets of every open descriptor of a process.
pub fn fd_targets(pid_dir: &Path) -> Result<Vec<PathBuf>> {
    let fd_dir = pid_dir.join("fd");
    let entries = fs::read_dir(&fd_dir).context("Failed to read fd dir")?;

    Ok(entries
        .flatten()
        .filter_map(|entry| fs::read_link(entry.path()).ok())
        .collect())
}

/// Socket inodes held open by a process.
pub fn socket_inodes(pid_dir: &Path) -> Result<Vec<u64>> {
    Ok(fd_targets(pid_dir)?
        .iter()
        .filter_map(|target| parse_socket_link(target))
        .collect())
}

/// Pids holding any of `inodes`, ascending. Unreadable processes are skipped,
/// so an empty result may mean "not permitted" rather than "no owner".
pub fn owners_of_inodes(proc_root: &Path, inodes: &HashSet<u64>) -> Result<Vec<u32>> {
    let mut owners = BTreeSet::new();

    for pid in list_pids(proc_root)? {
        let Ok(held) = socket_inodes(&proc_root.join(pid.to_string())) else {
            continue;
        };
        if held.iter().any(|inode| inodes.contains(inode)) {
            owners.insert(pid);
        }
    }

    Ok(owners.into_iter().collect())
}

fn parse_socket_link(path: &Path) -> Option<u64> {
    let s = path.to_string_lossy();
    s.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

//! Descendant process lookup backed by a shared sysinfo snapshot.
//!
//! The snapshot is refreshed once per scan tick rather than per pane; walking
//! the parent links for a pane's shell PID is then a cheap in-memory pass.

use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();

fn system() -> &'static Mutex<System> {
    SYSTEM.get_or_init(|| Mutex::new(System::new()))
}

/// Refreshes the process table. Call once at the start of each scan.
pub fn refresh_process_cache() {
    let mut sys = system().lock();
    sys.refresh_processes(ProcessesToUpdate::All, true);
}

/// Returns the command lines of all descendants of `root_pid`,
/// breadth-first with each level's siblings in ascending-PID order, so the
/// result is deterministic and direct children come before grandchildren.
pub fn descendant_commands(root_pid: u32) -> Vec<String> {
    let sys = system().lock();

    // parent pid -> children pids, built once per call
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, proc_) in sys.processes() {
        if let Some(parent) = proc_.parent() {
            children.entry(parent).or_default().push(*pid);
        }
    }
    for kids in children.values_mut() {
        kids.sort_unstable();
    }

    let mut commands = Vec::new();
    let mut queue = VecDeque::from([Pid::from_u32(root_pid)]);
    while let Some(pid) = queue.pop_front() {
        if let Some(kids) = children.get(&pid) {
            for kid in kids {
                if let Some(proc_) = sys.process(*kid) {
                    let cmdline = proc_
                        .cmd()
                        .iter()
                        .map(|a| a.to_string_lossy())
                        .collect::<Vec<_>>()
                        .join(" ");
                    if cmdline.is_empty() {
                        commands.push(proc_.name().to_string_lossy().into_owned());
                    } else {
                        commands.push(cmdline);
                    }
                }
                queue.push_back(*kid);
            }
        }
    }

    commands
}

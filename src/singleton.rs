use anyhow::{Context, Result};
use tracing::{info, warn};

/// Best-effort per-host singleton guard.
///
/// Scans the process table for other instances of this executable and
/// terminates them, so the instance that started last wins. Coarse by
/// design: the deployment model is one controller per host, so no
/// distributed lock is needed. Enumeration failures are reported but do not
/// prevent startup.
pub fn terminate_rivals() -> Result<usize> {
    let name = process_name()?;
    let own_pid = std::process::id();

    let rivals = find_rivals(&name, own_pid)?;

    let mut terminated = 0;
    for pid in rivals {
        match terminate(pid) {
            Ok(()) => {
                info!("Terminated rival instance (pid {})", pid);
                terminated += 1;
            }
            Err(e) => warn!("Failed to terminate rival instance (pid {}): {:#}", pid, e),
        }
    }

    Ok(terminated)
}

/// This executable's file name, used as the process identity
fn process_name() -> Result<String> {
    let exe = std::env::current_exe().context("Failed to determine current executable")?;
    exe.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .context("Executable path has no valid file name")
}

fn find_rivals(name: &str, own_pid: u32) -> Result<Vec<u32>> {
    #[cfg(target_os = "linux")]
    {
        linux_find_rivals(name, own_pid)
    }

    #[cfg(target_os = "macos")]
    {
        macos_find_rivals(name, own_pid)
    }

    #[cfg(target_os = "windows")]
    {
        windows_find_rivals(name, own_pid)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = (name, own_pid);
        anyhow::bail!("Unsupported operating system for process enumeration")
    }
}

fn terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if ret != 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("kill({}) failed", pid));
        }
        Ok(())
    }

    #[cfg(windows)]
    {
        let output = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output()
            .context("Failed to execute taskkill")?;

        if !output.status.success() {
            anyhow::bail!(
                "taskkill /PID {} failed: {}",
                pid,
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }
        Ok(())
    }
}

/// Whether a kernel-reported command name refers to this executable.
///
/// Linux truncates /proc/<pid>/comm to 15 characters, so a truncated match
/// of a longer name also counts.
fn names_match(reported: &str, name: &str) -> bool {
    if reported == name {
        return true;
    }
    name.len() > 15 && reported == &name[..15]
}

#[cfg(target_os = "linux")]
fn linux_find_rivals(name: &str, own_pid: u32) -> Result<Vec<u32>> {
    let entries = std::fs::read_dir("/proc").context("Failed to read /proc")?;

    let mut rivals = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };

        let pid: u32 = match entry.file_name().to_str().and_then(|n| n.parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        if pid == own_pid {
            continue;
        }

        // Processes may exit between read_dir and here
        let comm = match std::fs::read_to_string(entry.path().join("comm")) {
            Ok(comm) => comm,
            Err(_) => continue,
        };

        if names_match(comm.trim(), name) {
            rivals.push(pid);
        }
    }

    Ok(rivals)
}

#[cfg(target_os = "macos")]
fn macos_find_rivals(name: &str, own_pid: u32) -> Result<Vec<u32>> {
    let output = std::process::Command::new("ps")
        .args(["-axo", "pid=,comm="])
        .output()
        .context("Failed to execute ps")?;

    if !output.status.success() {
        anyhow::bail!("'ps -axo pid=,comm=' failed");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut rivals = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let pid: u32 = match parts.next().and_then(|p| p.parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };
        let comm = match parts.next() {
            Some(comm) => comm.trim(),
            None => continue,
        };

        // ps reports the full executable path on macOS
        let reported = comm.rsplit('/').next().unwrap_or(comm);
        if pid != own_pid && names_match(reported, name) {
            rivals.push(pid);
        }
    }

    Ok(rivals)
}

#[cfg(target_os = "windows")]
fn windows_find_rivals(name: &str, own_pid: u32) -> Result<Vec<u32>> {
    let output = std::process::Command::new("tasklist")
        .args(["/FO", "CSV", "/NH"])
        .output()
        .context("Failed to execute tasklist")?;

    if !output.status.success() {
        anyhow::bail!("'tasklist /FO CSV /NH' failed");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut rivals = Vec::new();
    for line in stdout.lines() {
        let mut fields = line.split("\",\"");
        let image = match fields.next() {
            Some(image) => image.trim_start_matches('"'),
            None => continue,
        };
        let pid: u32 = match fields.next().and_then(|p| p.trim_matches('"').parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        if pid != own_pid && names_match(image, name) {
            rivals.push(pid);
        }
    }

    Ok(rivals)
}

use anyhow::{Context, Result};
use std::process::Command;

/// Enumerate interfaces via `ifconfig -l`
pub fn list_interfaces() -> Result<Vec<String>> {
    let output = Command::new("ifconfig")
        .arg("-l")
        .output()
        .context("Failed to execute 'ifconfig -l'")?;

    if !output.status.success() {
        anyhow::bail!(
            "'ifconfig -l' failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.split_whitespace().map(str::to_string).collect())
}

/// Whether the interface reports the UP flag
pub fn is_enabled(name: &str) -> Result<bool> {
    let output = Command::new("ifconfig")
        .arg(name)
        .output()
        .with_context(|| format!("Failed to execute 'ifconfig {}'", name))?;

    if !output.status.success() {
        anyhow::bail!(
            "'ifconfig {}' failed: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(flags_contain_up(&stdout))
}

/// Bring the interface up or down via `ifconfig`
pub fn set_enabled(name: &str, up: bool) -> Result<()> {
    let state = if up { "up" } else { "down" };
    let output = Command::new("ifconfig")
        .args([name, state])
        .output()
        .with_context(|| format!("Failed to execute 'ifconfig {} {}'", name, state))?;

    if !output.status.success() {
        anyhow::bail!(
            "'ifconfig {} {}' failed: {}",
            name,
            state,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

/// Parse the `flags=8863<UP,BROADCAST,...>` line for the UP flag
fn flags_contain_up(ifconfig_output: &str) -> bool {
    ifconfig_output
        .lines()
        .next()
        .and_then(|line| line.split('<').nth(1))
        .and_then(|rest| rest.split('>').next())
        .map(|flags| flags.split(',').any(|f| f == "UP"))
        .unwrap_or(false)
}

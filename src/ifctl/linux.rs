use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

const SYSFS_NET: &str = "/sys/class/net";

// IFF_UP from <linux/if.h>
const IFF_UP: u64 = 0x1;

/// Enumerate interfaces from sysfs
pub fn list_interfaces() -> Result<Vec<String>> {
    let entries = std::fs::read_dir(SYSFS_NET)
        .with_context(|| format!("Failed to read {}", SYSFS_NET))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read sysfs entry")?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

/// Whether the interface is administratively up (IFF_UP set)
pub fn is_enabled(name: &str) -> Result<bool> {
    let flags_path = Path::new(SYSFS_NET).join(name).join("flags");
    let content = std::fs::read_to_string(&flags_path)
        .with_context(|| format!("Failed to read {}", flags_path.display()))?;

    let flags = parse_flags(content.trim())
        .with_context(|| format!("Unexpected flags value for {}: {}", name, content.trim()))?;

    Ok(flags & IFF_UP != 0)
}

/// Bring the interface up or down via `ip link`.
///
/// Applying the current state again is a no-op at the kernel level, so this
/// is safe to call without checking first.
pub fn set_enabled(name: &str, up: bool) -> Result<()> {
    let state = if up { "up" } else { "down" };
    let output = Command::new("ip")
        .args(["link", "set", name, state])
        .output()
        .context("Failed to execute 'ip link'")?;

    if !output.status.success() {
        anyhow::bail!(
            "'ip link set {} {}' failed: {}",
            name,
            state,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

/// Parse the sysfs flags file, which is hex with a 0x prefix
fn parse_flags(s: &str) -> Result<u64> {
    let hex = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(hex, 16).context("Not a hexadecimal flags value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags_handles_sysfs_format() {
        assert_eq!(parse_flags("0x1003").unwrap(), 0x1003);
        assert_eq!(parse_flags("0x1").unwrap(), 0x1);
        assert_eq!(parse_flags("1003").unwrap(), 0x1003);
    }

    #[test]
    fn parse_flags_rejects_garbage() {
        assert!(parse_flags("").is_err());
        assert!(parse_flags("up").is_err());
    }

    #[test]
    fn up_flag_detection() {
        assert_eq!(parse_flags("0x1003").unwrap() & IFF_UP, 1);
        assert_eq!(parse_flags("0x1002").unwrap() & IFF_UP, 0);
    }
}

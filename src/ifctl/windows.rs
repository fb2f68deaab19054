use anyhow::{Context, Result};
use std::process::Command;

/// Enumerate interfaces via `netsh interface show interface`
pub fn list_interfaces() -> Result<Vec<String>> {
    Ok(query_interfaces()?.into_iter().map(|i| i.name).collect())
}

/// Whether the interface's admin state is Enabled
pub fn is_enabled(name: &str) -> Result<bool> {
    query_interfaces()?
        .into_iter()
        .find(|i| i.name == name)
        .map(|i| i.enabled)
        .with_context(|| format!("No such interface: {}", name))
}

/// Set the interface's admin state via netsh
pub fn set_enabled(name: &str, up: bool) -> Result<()> {
    let admin = if up { "enable" } else { "disable" };
    let output = Command::new("netsh")
        .args([
            "interface",
            "set",
            "interface",
            &format!("name={}", name),
            &format!("admin={}", admin),
        ])
        .output()
        .context("Failed to execute netsh")?;

    if !output.status.success() {
        anyhow::bail!(
            "'netsh interface set interface {} admin={}' failed: {}",
            name,
            admin,
            String::from_utf8_lossy(&output.stdout).trim()
        );
    }

    Ok(())
}

struct NetshInterface {
    name: String,
    enabled: bool,
}

fn query_interfaces() -> Result<Vec<NetshInterface>> {
    let output = Command::new("netsh")
        .args(["interface", "show", "interface"])
        .output()
        .context("Failed to execute 'netsh interface show interface'")?;

    if !output.status.success() {
        anyhow::bail!(
            "'netsh interface show interface' failed: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
    }

    Ok(parse_netsh_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse netsh's fixed-header table:
///
/// ```text
/// Admin State    State          Type             Interface Name
/// -------------------------------------------------------------------------
/// Enabled        Connected      Dedicated        Ethernet
/// ```
fn parse_netsh_output(stdout: &str) -> Vec<NetshInterface> {
    stdout
        .lines()
        .skip_while(|line| !line.trim_start().starts_with('-'))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let admin = cols.next()?;
            let _state = cols.next()?;
            let _type = cols.next()?;
            let name = cols.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return None;
            }
            Some(NetshInterface {
                name,
                enabled: admin.eq_ignore_ascii_case("enabled"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Admin State    State          Type             Interface Name
-------------------------------------------------------------------------
Enabled        Connected      Dedicated        Ethernet
Disabled       Disconnected   Dedicated        Wi-Fi 2
";

    #[test]
    fn parses_netsh_table() {
        let interfaces = parse_netsh_output(SAMPLE);
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].name, "Ethernet");
        assert!(interfaces[0].enabled);
        assert_eq!(interfaces[1].name, "Wi-Fi 2");
        assert!(!interfaces[1].enabled);
    }

    #[test]
    fn empty_output_yields_no_interfaces() {
        assert!(parse_netsh_output("").is_empty());
    }
}

/// Network interface enumeration and control
///
/// The enforcement loop talks to interfaces only through the
/// `InterfaceControl` trait; `SystemInterfaces` is the production
/// implementation, dispatching to the platform-specific mechanism.
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

use anyhow::Result;

/// Opaque handle naming one network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Seam between the enforcement loop and the OS.
///
/// Every operation may fail; callers treat failures as transient and retry
/// on the next tick. `enable` and `disable` must be harmless no-ops when the
/// interface is already in the requested state.
pub trait InterfaceControl: Send + Sync + 'static {
    /// Enumerate the interfaces under management
    fn list(&self) -> Result<Vec<Interface>>;

    /// Whether the interface is currently administratively up
    fn is_enabled(&self, iface: &Interface) -> Result<bool>;

    /// Bring the interface up
    fn enable(&self, iface: &Interface) -> Result<()>;

    /// Bring the interface down
    fn disable(&self, iface: &Interface) -> Result<()>;
}

/// Production implementation backed by the platform's interface tooling
pub struct SystemInterfaces {
    exclude: Vec<String>,
}

impl SystemInterfaces {
    /// Create a controller that skips interfaces whose name appears in
    /// `exclude`. Loopback interfaces are always skipped.
    pub fn new(exclude: Vec<String>) -> Self {
        Self { exclude }
    }

    fn is_managed(&self, name: &str) -> bool {
        !is_loopback(name) && !self.exclude.iter().any(|e| e == name)
    }
}

impl InterfaceControl for SystemInterfaces {
    fn list(&self) -> Result<Vec<Interface>> {
        let names = platform_list()?;
        Ok(names
            .into_iter()
            .filter(|n| self.is_managed(n))
            .map(Interface::new)
            .collect())
    }

    fn is_enabled(&self, iface: &Interface) -> Result<bool> {
        platform_is_enabled(&iface.name)
    }

    fn enable(&self, iface: &Interface) -> Result<()> {
        platform_set_enabled(&iface.name, true)
    }

    fn disable(&self, iface: &Interface) -> Result<()> {
        platform_set_enabled(&iface.name, false)
    }
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.eq_ignore_ascii_case("loopback")
}

fn platform_list() -> Result<Vec<String>> {
    #[cfg(target_os = "linux")]
    {
        linux::list_interfaces()
    }

    #[cfg(target_os = "macos")]
    {
        macos::list_interfaces()
    }

    #[cfg(target_os = "windows")]
    {
        windows::list_interfaces()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system for interface enumeration")
    }
}

fn platform_is_enabled(name: &str) -> Result<bool> {
    #[cfg(target_os = "linux")]
    {
        linux::is_enabled(name)
    }

    #[cfg(target_os = "macos")]
    {
        macos::is_enabled(name)
    }

    #[cfg(target_os = "windows")]
    {
        windows::is_enabled(name)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = name;
        anyhow::bail!("Unsupported operating system for interface control")
    }
}

fn platform_set_enabled(name: &str, up: bool) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        linux::set_enabled(name, up)
    }

    #[cfg(target_os = "macos")]
    {
        macos::set_enabled(name, up)
    }

    #[cfg(target_os = "windows")]
    {
        windows::set_enabled(name, up)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = (name, up);
        anyhow::bail!("Unsupported operating system for interface control")
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory interface set for loop tests
    pub struct MockInterfaces {
        state: Mutex<BTreeMap<String, bool>>,
        pub enable_calls: AtomicUsize,
        pub disable_calls: AtomicUsize,
        pub fail_toggles: AtomicBool,
    }

    impl MockInterfaces {
        pub fn new(interfaces: &[(&str, bool)]) -> Self {
            Self {
                state: Mutex::new(
                    interfaces
                        .iter()
                        .map(|(n, up)| (n.to_string(), *up))
                        .collect(),
                ),
                enable_calls: AtomicUsize::new(0),
                disable_calls: AtomicUsize::new(0),
                fail_toggles: AtomicBool::new(false),
            }
        }

        pub fn snapshot(&self) -> BTreeMap<String, bool> {
            self.state.lock().unwrap().clone()
        }

        /// Flip an interface's state out of band, without counting a call
        pub fn set(&self, name: &str, up: bool) {
            self.state.lock().unwrap().insert(name.to_string(), up);
        }

        pub fn all_enabled(&self) -> bool {
            self.snapshot().values().all(|up| *up)
        }

        pub fn all_disabled(&self) -> bool {
            self.snapshot().values().all(|up| !*up)
        }
    }

    impl InterfaceControl for MockInterfaces {
        fn list(&self) -> Result<Vec<Interface>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .keys()
                .map(Interface::new)
                .collect())
        }

        fn is_enabled(&self, iface: &Interface) -> Result<bool> {
            self.state
                .lock()
                .unwrap()
                .get(&iface.name)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("No such interface: {}", iface.name))
        }

        fn enable(&self, iface: &Interface) -> Result<()> {
            if self.fail_toggles.load(Ordering::SeqCst) {
                anyhow::bail!("Injected toggle failure");
            }
            self.enable_calls.fetch_add(1, Ordering::SeqCst);
            self.state.lock().unwrap().insert(iface.name.clone(), true);
            Ok(())
        }

        fn disable(&self, iface: &Interface) -> Result<()> {
            if self.fail_toggles.load(Ordering::SeqCst) {
                anyhow::bail!("Injected toggle failure");
            }
            self.disable_calls.fetch_add(1, Ordering::SeqCst);
            self.state.lock().unwrap().insert(iface.name.clone(), false);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_names_are_recognized() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("lo0"));
        assert!(is_loopback("loopback"));
        assert!(!is_loopback("eth0"));
        assert!(!is_loopback("wlan0"));
    }

    #[test]
    fn excluded_interfaces_are_not_managed() {
        let ctl = SystemInterfaces::new(vec!["docker0".to_string()]);
        assert!(!ctl.is_managed("docker0"));
        assert!(!ctl.is_managed("lo"));
        assert!(ctl.is_managed("eth0"));
    }
}

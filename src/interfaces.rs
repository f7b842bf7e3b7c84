//! Mapping from interface names to local bind addresses.
//!
//! Enumerating the host's interfaces belongs to whoever embeds the
//! engine; the engine only needs a name → address lookup.

use crate::errors::SpeedTestError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

/// Name of the built-in entry that leaves route selection to the OS.
pub const DEFAULT_INTERFACE: &str = "default";

/// A resolved interface binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    /// Address every socket of the run binds to; `None` lets the
    /// operating system choose.
    pub address: Option<IpAddr>,
}

pub trait InterfaceResolver {
    /// Look up an interface by name, `None` if it is unknown.
    fn resolve(&self, name: &str) -> Option<LocalInterface>;
}

/// Static interface table.
#[derive(Debug, Clone)]
pub struct InterfaceTable {
    bindings: HashMap<String, Option<IpAddr>>,
}

impl InterfaceTable {
    /// A table with only the `default` entry.
    pub fn new() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(DEFAULT_INTERFACE.to_string(), None);

        Self { bindings }
    }

    pub fn with_binding(mut self, name: impl Into<String>, address: IpAddr) -> Self {
        self.bindings.insert(name.into(), Some(address));
        self
    }

    pub fn from_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = InterfaceBinding>,
    {
        bindings.into_iter().fold(Self::new(), |table, binding| {
            table.with_binding(binding.name, binding.address)
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> =
            self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for InterfaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceResolver for InterfaceTable {
    fn resolve(&self, name: &str) -> Option<LocalInterface> {
        self.bindings.get(name).map(|address| LocalInterface {
            name: name.to_string(),
            address: *address,
        })
    }
}

/// A `NAME=ADDRESS` pair, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBinding {
    pub name: String,
    pub address: IpAddr,
}

impl FromStr for InterfaceBinding {
    type Err = SpeedTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, address) = s.split_once('=').ok_or_else(|| {
            SpeedTestError::config(format!(
                "expected NAME=ADDRESS, got '{}'",
                s
            ))
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(SpeedTestError::config("interface name is empty"));
        }

        let address = address.trim().parse::<IpAddr>().map_err(|e| {
            SpeedTestError::config(format!(
                "invalid address for interface '{}': {}",
                name, address
            ))
            .with_source(e)
        })?;

        Ok(Self { name: name.to_string(), address })
    }
}

//! Interface names, descriptions and loans.
//!
//! Interface names are opaque `<prefix>/<suffix>` strings. A name whose
//! prefix matches a loaded controller's name denotes a chained interface
//! (a reference or exported-state interface of that controller) rather than
//! a hardware channel.

use serde::Serialize;

use crate::error::{ArmatureError, ArmatureResult};

/// Split an interface name into `(prefix, suffix)`.
///
/// Every interface name carries at least one `/`; a name without one is a
/// corrupted registry entry and reported as an internal error.
pub fn split_interface(name: &str) -> ArmatureResult<(&str, &str)> {
    match name.split_once('/') {
        Some(parts) => Ok(parts),
        None => Err(ArmatureError::internal(format!(
            "character '/' not found in interface name '{}'",
            name
        ))),
    }
}

/// The `<prefix>` part of an interface name, if well formed.
pub fn interface_prefix(name: &str) -> Option<&str> {
    name.split_once('/').map(|(prefix, _)| prefix)
}

/// Description of an interface exported by a chainable controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceDescription {
    /// Full interface name, `<controller>/<suffix>`
    pub name: String,
    /// Value the interface starts out with after activation
    pub initial_value: f64,
}

impl InterfaceDescription {
    pub fn new<S: Into<String>>(name: S, initial_value: f64) -> Self {
        Self {
            name: name.into(),
            initial_value,
        }
    }
}

/// Exclusive loan of a command interface.
///
/// Exactly one controller holds the loan of a command interface at any time.
/// Loans are created by the interface registry on claim and must be handed
/// back through [`release_command_interface`](super::ResourceManager::release_command_interface)
/// to return the interface to availability.
#[derive(Debug)]
pub struct CommandLoan {
    name: String,
}

impl CommandLoan {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shared loan of a state interface. State interfaces may have any number of
/// readers; the loan only tracks that this reader is registered.
#[derive(Debug)]
pub struct StateLoan {
    name: String,
}

impl StateLoan {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_interface() {
        let (prefix, suffix) = split_interface("joint1/position").unwrap();
        assert_eq!(prefix, "joint1");
        assert_eq!(suffix, "position");

        // Only the first '/' splits; chained names keep their tail intact
        let (prefix, suffix) = split_interface("traj/joint1/position").unwrap();
        assert_eq!(prefix, "traj");
        assert_eq!(suffix, "joint1/position");
    }

    #[test]
    fn test_split_interface_rejects_flat_name() {
        let err = split_interface("position").unwrap_err();
        assert!(matches!(err, ArmatureError::Internal { .. }));
    }

    #[test]
    fn test_interface_prefix() {
        assert_eq!(interface_prefix("arm_hw/joint1"), Some("arm_hw"));
        assert_eq!(interface_prefix("nodelimiter"), None);
    }
}

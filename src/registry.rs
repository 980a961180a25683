use anyhow::{bail, Result};

use crate::config::MachineProfile;
use crate::error::SelectionError;

/// The configured set of machines, in display order.
///
/// Read-only once built. The registry order is the order used for selection
/// controls and for the default selection.
#[derive(Debug, Clone)]
pub struct MachineRegistry {
    machines: Vec<MachineProfile>,
}

impl MachineRegistry {
    pub fn new(machines: Vec<MachineProfile>) -> Result<Self> {
        if machines.is_empty() {
            bail!("machine registry must contain at least one machine");
        }
        for (i, m) in machines.iter().enumerate() {
            if machines[..i].iter().any(|other| other.id == m.id) {
                bail!("duplicate machine id in registry: {}", m.id);
            }
        }
        Ok(Self { machines })
    }

    pub fn ids(&self) -> Vec<String> {
        self.machines.iter().map(|m| m.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MachineProfile> {
        self.machines.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Validate a selection and return its profiles in registry order.
    ///
    /// Duplicates collapse; an empty selection or an unknown id is an error.
    pub fn resolve<S: AsRef<str>>(&self, selection: &[S]) -> Result<Vec<&MachineProfile>, SelectionError> {
        if selection.is_empty() {
            return Err(SelectionError::EmptyMachineSelection);
        }
        if let Some(unknown) = selection.iter().find(|id| !self.contains(id.as_ref())) {
            return Err(SelectionError::UnknownMachine(unknown.as_ref().to_string()));
        }
        Ok(self
            .machines
            .iter()
            .filter(|m| selection.iter().any(|id| id.as_ref() == m.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MachineRegistry {
        MachineRegistry::new(vec![
            MachineProfile::new("M001", 100.0, 2.0, 10.0),
            MachineProfile::new("M002", 100.0, 2.0, 10.0),
            MachineProfile::new("M003", 100.0, 2.0, 10.0),
        ])
        .unwrap()
    }

    #[test]
    fn resolve_returns_registry_order_without_duplicates() {
        let r = registry();
        let picked = r.resolve(&["M003", "M001", "M003"]).unwrap();
        let ids: Vec<&str> = picked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["M001", "M003"]);
    }

    #[test]
    fn resolve_rejects_empty_and_unknown() {
        let r = registry();
        let empty: [&str; 0] = [];
        assert_eq!(r.resolve(&empty).unwrap_err(), SelectionError::EmptyMachineSelection);
        assert_eq!(
            r.resolve(&["M001", "M999"]).unwrap_err(),
            SelectionError::UnknownMachine("M999".into())
        );
    }

    #[test]
    fn lookup_by_id() {
        let r = registry();
        assert_eq!(r.len(), 3);
        assert!(r.contains("M002"));
        assert!(r.get("M004").is_none());
        assert_eq!(r.ids(), vec!["M001", "M002", "M003"]);
    }

    #[test]
    fn rejects_empty_or_duplicate_registry() {
        assert!(MachineRegistry::new(vec![]).is_err());
        assert!(MachineRegistry::new(vec![
            MachineProfile::new("M001", 1.0, 1.0, 1.0),
            MachineProfile::new("M001", 1.0, 1.0, 1.0),
        ])
        .is_err());
    }
}

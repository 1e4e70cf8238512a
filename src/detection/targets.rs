//! Custom detection target registry
//!
//! Operators can extend the baseline watch list with their own targets,
//! each bound to exactly one detection source: a baseline classifier class
//! or an uploaded model artifact. The binding lives in the
//! [`DetectionSource`] enum, so switching source kinds replaces it
//! wholesale and the single-binding invariant holds by construction.

use patrol_shared::{CustomTarget, DetectionSource};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TargetRegistryError {
    #[error("custom target not found: {0}")]
    NotFound(String),

    #[error("confidence threshold out of range: {0}")]
    InvalidThreshold(f64),
}

/// Owns the operator-defined detection targets
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<CustomTarget>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, targets: Vec<CustomTarget>) {
        self.targets = targets;
    }

    pub fn snapshot(&self) -> Vec<CustomTarget> {
        self.targets.clone()
    }

    pub fn add(&mut self, target: CustomTarget) -> Result<(), TargetRegistryError> {
        Self::validate_threshold(target.threshold)?;
        // Re-adding an id replaces the previous definition
        self.targets.retain(|t| t.id != target.id);
        self.targets.push(target);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<(), TargetRegistryError> {
        let before = self.targets.len();
        self.targets.retain(|t| t.id != id);
        if self.targets.len() == before {
            return Err(TargetRegistryError::NotFound(id.into()));
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), TargetRegistryError> {
        self.find_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_threshold(&mut self, id: &str, threshold: f64) -> Result<(), TargetRegistryError> {
        Self::validate_threshold(threshold)?;
        self.find_mut(id)?.threshold = threshold;
        Ok(())
    }

    /// Rebind the target's detection source, dropping the previous binding
    pub fn set_source(&mut self, id: &str, source: DetectionSource) -> Result<(), TargetRegistryError> {
        self.find_mut(id)?.source = source;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&CustomTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomTarget> {
        self.targets.iter()
    }

    /// Confidence floor for alerts on `target`, or `None` when the target
    /// is an explicitly disabled custom target.
    ///
    /// Custom targets match by id or label and carry their own threshold;
    /// everything else falls back to the global sensitivity percentage.
    pub fn effective_threshold(&self, target: &str, sensitivity_pct: u8) -> Option<f64> {
        match self
            .targets
            .iter()
            .find(|t| t.id == target || t.label.eq_ignore_ascii_case(target))
        {
            Some(custom) if custom.enabled => Some(custom.threshold),
            Some(_) => None,
            None => Some(sensitivity_pct as f64 / 100.0),
        }
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut CustomTarget, TargetRegistryError> {
        self.targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TargetRegistryError::NotFound(id.into()))
    }

    fn validate_threshold(threshold: f64) -> Result<(), TargetRegistryError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(TargetRegistryError::InvalidThreshold(threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badger() -> CustomTarget {
        CustomTarget {
            id: "tgt_badger".into(),
            label: "Badger".into(),
            icon: "paw".into(),
            enabled: true,
            threshold: 0.8,
            source: DetectionSource::Baseline {
                class: "animal".into(),
            },
        }
    }

    #[test]
    fn test_custom_threshold_overrides_global() {
        let mut reg = TargetRegistry::new();
        reg.add(badger()).unwrap();

        assert_eq!(reg.effective_threshold("badger", 70), Some(0.8));
        assert_eq!(reg.effective_threshold("tgt_badger", 70), Some(0.8));
        // Unknown targets use the global sensitivity
        assert_eq!(reg.effective_threshold("snail", 70), Some(0.7));
    }

    #[test]
    fn test_disabled_target_gates_out() {
        let mut reg = TargetRegistry::new();
        reg.add(badger()).unwrap();
        reg.set_enabled("tgt_badger", false).unwrap();
        assert_eq!(reg.effective_threshold("badger", 70), None);
    }

    #[test]
    fn test_rebinding_replaces_source() {
        let mut reg = TargetRegistry::new();
        reg.add(badger()).unwrap();

        reg.set_source(
            "tgt_badger",
            DetectionSource::Model {
                artifact: "models/badger-v1.onnx".into(),
            },
        )
        .unwrap();

        match &reg.get("tgt_badger").unwrap().source {
            DetectionSource::Model { artifact } => assert_eq!(artifact, "models/badger-v1.onnx"),
            other => panic!("expected model binding, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_validation() {
        let mut reg = TargetRegistry::new();
        reg.add(badger()).unwrap();
        assert_eq!(
            reg.set_threshold("tgt_badger", 1.5),
            Err(TargetRegistryError::InvalidThreshold(1.5))
        );
        assert!(reg.set_threshold("tgt_badger", 0.55).is_ok());
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let mut reg = TargetRegistry::new();
        assert_eq!(
            reg.remove("tgt_ghost"),
            Err(TargetRegistryError::NotFound("tgt_ghost".into()))
        );
    }
}

//! Lookup table from device type to stamper.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SimError};

use super::{
    CapacitorStamper, CoupledInductorStamper, CurrentSourceStamper, DeviceStamper, DeviceType,
    DiodeStamper, InductorStamper, ResistorStamper, SwitchStamper, VoltageSourceStamper,
};

/// Registry of stampers, one slot per [`DeviceType`].
///
/// Stampers are stateless, so a registry is shared between simulations
/// behind an `Arc`.
#[derive(Clone, Default)]
pub struct StamperRegistry {
    slots: [Option<Arc<dyn DeviceStamper>>; DeviceType::COUNT],
}

impl StamperRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a stamper for every built-in device type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ResistorStamper));
        registry.register(Arc::new(CapacitorStamper));
        registry.register(Arc::new(InductorStamper));
        registry.register(Arc::new(CoupledInductorStamper));
        registry.register(Arc::new(VoltageSourceStamper));
        registry.register(Arc::new(CurrentSourceStamper));
        registry.register(Arc::new(DiodeStamper));
        registry.register(Arc::new(SwitchStamper::ideal()));
        registry.register(Arc::new(SwitchStamper::mosfet()));
        registry.register(Arc::new(SwitchStamper::igbt()));
        registry.register(Arc::new(SwitchStamper::thyristor()));
        registry
    }

    /// Register a stamper under its own device type, replacing any previous one.
    pub fn register(&mut self, stamper: Arc<dyn DeviceStamper>) -> Option<Arc<dyn DeviceStamper>> {
        let slot = stamper.device_type().index();
        self.slots[slot].replace(stamper)
    }

    pub fn unregister(&mut self, device: DeviceType) -> Option<Arc<dyn DeviceStamper>> {
        self.slots[device.index()].take()
    }

    pub fn has(&self, device: DeviceType) -> bool {
        self.slots[device.index()].is_some()
    }

    pub fn get(&self, device: DeviceType) -> Option<&Arc<dyn DeviceStamper>> {
        self.slots[device.index()].as_ref()
    }

    /// Like [`get`](Self::get), but a missing stamper is an error.
    pub fn get_required(&self, device: DeviceType) -> Result<&Arc<dyn DeviceStamper>> {
        self.get(device).ok_or_else(|| SimError::MissingStamper {
            device: device.tag().to_string(),
        })
    }

    /// Registered device types in table order.
    pub fn registered_types(&self) -> Vec<DeviceType> {
        DeviceType::ALL.iter().copied().filter(|d| self.has(*d)).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

impl fmt::Debug for StamperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.registered_types()).finish()
    }
}

impl fmt::Display for StamperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<_> = self.registered_types().iter().map(|d| d.tag()).collect();
        write!(f, "StamperRegistry[size={}, types=[{}]]", self.len(), tags.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_type() {
        let registry = StamperRegistry::with_defaults();
        assert_eq!(registry.len(), DeviceType::COUNT);
        for device in DeviceType::ALL {
            assert_eq!(registry.get_required(device).unwrap().device_type(), device);
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = StamperRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(Arc::new(ResistorStamper)).is_none());
        assert!(registry.register(Arc::new(ResistorStamper)).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_stamper() {
        let mut registry = StamperRegistry::with_defaults();
        registry.unregister(DeviceType::Igbt);
        assert!(!registry.has(DeviceType::Igbt));
        assert!(matches!(
            registry.get_required(DeviceType::Igbt),
            Err(SimError::MissingStamper { device }) if device == "LK_IGBT"
        ));
        registry.clear();
        assert!(registry.registered_types().is_empty());
    }

    #[test]
    fn test_display() {
        let mut registry = StamperRegistry::new();
        registry.register(Arc::new(ResistorStamper));
        registry.register(Arc::new(DiodeStamper));
        assert_eq!(registry.to_string(), "StamperRegistry[size=2, types=[LK_R, LK_D]]");
    }
}

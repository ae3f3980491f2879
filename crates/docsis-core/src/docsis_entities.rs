/// Kind of device that can be placed in a simulation.
/// Devices are built through a factory keyed on this value.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub enum DeviceKind {
    /// Shared hybrid fibre-coax medium
    Hfc,
    /// Cable modem termination system (head-end)
    Cmts,
    /// Cable modem (subscriber)
    Cm,
    /// Anything above the MAC, or a test sink
    User,
}

/// Handle of an entity registered with the message router.
/// Entities refer to each other only through these handles.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl core::fmt::Debug for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

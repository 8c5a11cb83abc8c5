//! Machine registry for automatic front-end discovery.
//!
//! Each front-end-capable machine self-registers via [`inventory::submit!`]
//! with a [`MachineEntry`] containing its CLI name, ROM set name, and a
//! factory function. The front-end discovers available machines at runtime
//! without any central list.

use kc85_core::core::machine::Machine;

use crate::kc85::{Kc85System, Kc85Variant};
use crate::rom_loader::{RomLoadError, RomSet};

/// Describes a front-end-capable machine.
pub struct MachineEntry {
    /// CLI name used to select this machine (e.g., "kc85_3").
    pub name: &'static str,
    /// ROM set directory name for lookup (e.g., "kc85_3").
    pub rom_name: &'static str,
    /// Factory: construct a Machine from a loaded ROM set.
    pub create: fn(&RomSet) -> Result<Box<dyn Machine>, RomLoadError>,
}

impl MachineEntry {
    pub const fn new(
        name: &'static str,
        rom_name: &'static str,
        create: fn(&RomSet) -> Result<Box<dyn Machine>, RomLoadError>,
    ) -> Self {
        Self {
            name,
            rom_name,
            create,
        }
    }
}

inventory::collect!(MachineEntry);

/// Return all registered front-end-capable machines, sorted by name.
pub fn all() -> Vec<&'static MachineEntry> {
    let mut entries: Vec<_> = inventory::iter::<MachineEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a machine by its CLI name.
pub fn find(name: &str) -> Option<&'static MachineEntry> {
    inventory::iter::<MachineEntry>
        .into_iter()
        .find(|e| e.name == name)
}

fn create_kc85_2(roms: &RomSet) -> Result<Box<dyn Machine>, RomLoadError> {
    let caos = roms.require("caos22")?.to_vec();
    Ok(Box::new(Kc85System::new(Kc85Variant::Kc85_2, caos, Vec::new(), Vec::new())))
}

fn create_kc85_3(roms: &RomSet) -> Result<Box<dyn Machine>, RomLoadError> {
    let caos = roms.require("caos31")?.to_vec();
    let basic = roms.require("basic_c0")?.to_vec();
    Ok(Box::new(Kc85System::new(Kc85Variant::Kc85_3, caos, basic, Vec::new())))
}

fn create_kc85_4(roms: &RomSet) -> Result<Box<dyn Machine>, RomLoadError> {
    let caos = roms.require("caos42e")?.to_vec();
    let basic = roms.require("basic_c0")?.to_vec();
    let caos_c = roms.require("caos42c")?.to_vec();
    Ok(Box::new(Kc85System::new(Kc85Variant::Kc85_4, caos, basic, caos_c)))
}

inventory::submit! {
    MachineEntry::new("kc85_2", "kc85_2", create_kc85_2)
}
inventory::submit! {
    MachineEntry::new("kc85_3", "kc85_3", create_kc85_3)
}
inventory::submit! {
    MachineEntry::new("kc85_4", "kc85_4", create_kc85_4)
}

pub mod kc85;
pub mod kcc_loader;
pub mod registry;
pub mod rom_loader;

pub use kc85::{Kc85System, Kc85Variant};

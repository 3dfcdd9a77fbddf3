pub mod instance;
pub mod mods;

pub use instance::{InstanceConfig, InstanceRegistry, InstanceSummary};
pub use mods::{ModEntry, ModList};

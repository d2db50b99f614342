pub mod catalog;
pub mod definition;

pub use catalog::{SpellCatalog, SpellLine};
pub use definition::{SpellDefinition, SpellFamily, TargetMode};

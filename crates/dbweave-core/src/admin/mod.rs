// ── Administration ──
//
// Registry of administration screens, plus the activation tracker. The
// setup wizard in `crate::wizard` is derived from the same registry.

mod item;
mod registry;
mod screen;

pub use item::{
    AdministrationItem, AdministrationSubItem, ItemKind, ItemLifecycle, NoHooks, WizardOptions,
    WizardStepHooks,
};
pub use registry::{AdministrationRegistry, AdministrationRegistryBuilder};
pub use screen::{ActiveItem, AdministrationScreen};

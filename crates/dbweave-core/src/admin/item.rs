// ── Administration items ──

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Which administration mode an item belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemKind {
    /// Shown both in regular administration and in the setup wizard.
    #[default]
    Default,
    /// Regular administration only.
    Administration,
    /// Setup wizard only.
    ConfigurationWizard,
}

impl ItemKind {
    /// Whether items of this kind are visible in the given mode.
    pub fn visible_in(self, configuration_wizard: bool) -> bool {
        match self {
            Self::Default => true,
            Self::Administration => !configuration_wizard,
            Self::ConfigurationWizard => configuration_wizard,
        }
    }
}

/// Behavior of an item acting as a setup wizard step.
#[async_trait]
pub trait WizardStepHooks: Send + Sync {
    /// The step's required input is complete.
    fn is_done(&self) -> bool {
        true
    }

    /// Runs when the user leaves the step forward. `Ok(false)` keeps the
    /// wizard on this step.
    async fn on_finish(&self) -> Result<bool, CoreError> {
        Ok(true)
    }

    /// Runs once the whole wizard completes, for every finished step.
    async fn on_configuration_finish(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Hooks for steps with nothing to validate.
pub struct NoHooks;

impl WizardStepHooks for NoHooks {}

/// Activation callbacks for items and sub-items.
#[async_trait]
pub trait ItemLifecycle: Send + Sync {
    async fn on_activate(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn on_deactivate(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Wizard placement of an item.
#[derive(Clone)]
pub struct WizardOptions {
    pub order: i32,
    pub description: Option<String>,
    pub hooks: Arc<dyn WizardStepHooks>,
}

impl WizardOptions {
    pub fn new(order: i32, hooks: Arc<dyn WizardStepHooks>) -> Self {
        Self {
            order,
            description: None,
            hooks,
        }
    }
}

impl fmt::Debug for WizardOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardOptions")
            .field("order", &self.order)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A nested page of an administration item.
#[derive(Clone)]
pub struct AdministrationSubItem {
    pub name: String,
    pub view: Option<String>,
    pub lifecycle: Option<Arc<dyn ItemLifecycle>>,
}

impl AdministrationSubItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: None,
            lifecycle: None,
        }
    }
}

impl fmt::Debug for AdministrationSubItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdministrationSubItem")
            .field("name", &self.name)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

/// One administration screen.
///
/// `view` names the screen's content; front-ends resolve it against their
/// own table of render functions.
#[derive(Clone)]
pub struct AdministrationItem {
    pub name: String,
    pub kind: ItemKind,
    pub order: i32,
    pub view: String,
    pub sub_items: Vec<AdministrationSubItem>,
    pub wizard: Option<WizardOptions>,
    pub lifecycle: Option<Arc<dyn ItemLifecycle>>,
}

impl AdministrationItem {
    /// An item of kind [`ItemKind::Default`] whose view tag is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            view: name.clone(),
            name,
            kind: ItemKind::Default,
            order: i32::MAX,
            sub_items: Vec::new(),
            wizard: None,
            lifecycle: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = view.into();
        self
    }

    #[must_use]
    pub fn sub_item(mut self, sub_item: AdministrationSubItem) -> Self {
        self.sub_items.push(sub_item);
        self
    }

    #[must_use]
    pub fn wizard(mut self, options: WizardOptions) -> Self {
        self.wizard = Some(options);
        self
    }

    #[must_use]
    pub fn lifecycle(mut self, lifecycle: Arc<dyn ItemLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn get_sub_item(&self, name: &str) -> Option<&AdministrationSubItem> {
        self.sub_items.iter().find(|s| s.name == name)
    }

    /// `true` unless the item is a wizard step whose input is incomplete.
    pub fn is_done(&self) -> bool {
        self.wizard.as_ref().is_none_or(|w| w.hooks.is_done())
    }
}

impl fmt::Debug for AdministrationItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdministrationItem")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("order", &self.order)
            .field("view", &self.view)
            .field("sub_items", &self.sub_items)
            .field("wizard", &self.wizard)
            .finish_non_exhaustive()
    }
}

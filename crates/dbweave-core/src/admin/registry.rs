// ── Administration item registry ──
//
// Built once at startup from every feature's items, then read-only. Items
// are kept sorted by `order`, ties broken by registration order.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::item::AdministrationItem;
use crate::error::CoreError;

/// Collects items before the registry is frozen.
#[derive(Debug, Default)]
pub struct AdministrationRegistryBuilder {
    items: IndexMap<String, AdministrationItem>,
}

impl AdministrationRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new item. Names are unique.
    pub fn add(&mut self, item: AdministrationItem) -> Result<&mut Self, CoreError> {
        if self.items.contains_key(&item.name) {
            return Err(CoreError::ValidationFailed {
                message: format!("administration item already registered: {}", item.name),
            });
        }
        self.items.insert(item.name.clone(), item);
        Ok(self)
    }

    /// Register `item`, overriding any item with the same name in place.
    pub fn replace(&mut self, item: AdministrationItem) -> &mut Self {
        self.items.insert(item.name.clone(), item);
        self
    }

    pub fn build(&mut self) -> AdministrationRegistry {
        let mut items: Vec<Arc<AdministrationItem>> =
            std::mem::take(&mut self.items).into_values().map(Arc::new).collect();
        items.sort_by_key(|item| item.order);
        debug!(count = items.len(), "administration registry built");
        AdministrationRegistry {
            items: items.into(),
        }
    }
}

/// Read-only set of administration items.
#[derive(Debug, Clone)]
pub struct AdministrationRegistry {
    items: Arc<[Arc<AdministrationItem>]>,
}

impl AdministrationRegistry {
    pub fn builder() -> AdministrationRegistryBuilder {
        AdministrationRegistryBuilder::new()
    }

    pub fn items(&self) -> &[Arc<AdministrationItem>] {
        &self.items
    }

    pub fn get_item(&self, name: &str) -> Option<Arc<AdministrationItem>> {
        self.items.iter().find(|i| i.name == name).cloned()
    }

    /// Items visible in setup-wizard mode (`true`) or regular
    /// administration (`false`).
    pub fn filter_configuration_wizard(
        &self,
        configuration_wizard: bool,
    ) -> Vec<Arc<AdministrationItem>> {
        self.items
            .iter()
            .filter(|i| i.kind.visible_in(configuration_wizard))
            .cloned()
            .collect()
    }

    /// The item a screen opens on when none is selected.
    pub fn get_default_item(&self, configuration_wizard: bool) -> Option<Arc<AdministrationItem>> {
        if configuration_wizard {
            return self.wizard_steps().into_iter().next();
        }
        self.filter_configuration_wizard(false).into_iter().next()
    }

    /// Wizard-visible items that declare wizard options, in wizard order.
    pub fn wizard_steps(&self) -> Vec<Arc<AdministrationItem>> {
        let mut steps: Vec<Arc<AdministrationItem>> = self
            .filter_configuration_wizard(true)
            .into_iter()
            .filter(|i| i.wizard.is_some())
            .collect();
        steps.sort_by_key(|i| i.wizard.as_ref().map_or(i32::MAX, |w| w.order));
        steps
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::admin::{ItemKind, NoHooks, WizardOptions};

    fn names(items: &[Arc<AdministrationItem>]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    fn registry() -> AdministrationRegistry {
        let mut builder = AdministrationRegistry::builder();
        builder
            .add(AdministrationItem::new("users").kind(ItemKind::Administration).order(2))
            .unwrap()
            .add(
                AdministrationItem::new("welcome")
                    .kind(ItemKind::ConfigurationWizard)
                    .order(1)
                    .wizard(WizardOptions::new(1, Arc::new(NoHooks))),
            )
            .unwrap()
            .add(
                AdministrationItem::new("server")
                    .order(3)
                    .wizard(WizardOptions::new(2, Arc::new(NoHooks))),
            )
            .unwrap()
            .add(AdministrationItem::new("connections").order(4))
            .unwrap();
        builder.build()
    }

    #[test]
    fn wizard_filter_excludes_administration_items() {
        let registry = registry();
        assert_eq!(
            names(&registry.filter_configuration_wizard(true)),
            vec!["welcome", "server", "connections"]
        );
    }

    #[test]
    fn admin_filter_excludes_wizard_items() {
        let registry = registry();
        assert_eq!(
            names(&registry.filter_configuration_wizard(false)),
            vec!["users", "server", "connections"]
        );
    }

    #[test]
    fn wizard_steps_need_options() {
        assert_eq!(names(&registry().wizard_steps()), vec!["welcome", "server"]);
    }

    #[test]
    fn default_item_depends_on_mode() {
        let registry = registry();
        assert_eq!(registry.get_default_item(false).unwrap().name, "users");
        assert_eq!(registry.get_default_item(true).unwrap().name, "welcome");
    }

    #[test]
    fn duplicate_add_fails_but_replace_overrides() {
        let mut builder = AdministrationRegistry::builder();
        builder.add(AdministrationItem::new("users")).unwrap();
        assert!(builder.add(AdministrationItem::new("users")).is_err());

        builder.replace(AdministrationItem::new("users").view("user-list"));
        let registry = builder.build();
        assert_eq!(registry.items().len(), 1);
        assert_eq!(registry.get_item("users").unwrap().view, "user-list");
    }
}

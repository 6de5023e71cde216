// ── Administration screen activation ──

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::debug;

use super::item::{AdministrationItem, ItemLifecycle};
use super::registry::AdministrationRegistry;
use crate::error::CoreError;

/// The item (and optional sub-item) currently shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveItem {
    pub item: String,
    pub sub_item: Option<String>,
}

/// Tracks which administration item is open and runs activation callbacks.
///
/// Opening an item deactivates the previous one first.
pub struct AdministrationScreen {
    registry: AdministrationRegistry,
    active: Mutex<Option<ActiveItem>>,
    changes: watch::Sender<Option<ActiveItem>>,
}

impl AdministrationScreen {
    pub fn new(registry: AdministrationRegistry) -> Self {
        Self {
            registry,
            active: Mutex::new(None),
            changes: watch::channel(None).0,
        }
    }

    pub fn registry(&self) -> &AdministrationRegistry {
        &self.registry
    }

    pub fn active(&self) -> Option<ActiveItem> {
        self.changes.borrow().clone()
    }

    pub fn watch_active(&self) -> watch::Receiver<Option<ActiveItem>> {
        self.changes.subscribe()
    }

    /// Open `item`, optionally at `sub_item`.
    pub async fn activate(&self, item: &str, sub_item: Option<&str>) -> Result<(), CoreError> {
        let next = self
            .registry
            .get_item(item)
            .ok_or_else(|| CoreError::not_found("administration item", item))?;
        let next_sub = sub_item
            .map(|name| {
                next.get_sub_item(name)
                    .map(|s| s.lifecycle.clone())
                    .ok_or_else(|| CoreError::not_found("administration sub-item", name))
            })
            .transpose()?;

        let mut active = self.active.lock().await;
        let same_item = active.as_ref().is_some_and(|a| a.item == item);
        if same_item && active.as_ref().and_then(|a| a.sub_item.as_deref()) == sub_item {
            return Ok(());
        }

        let result = self
            .switch(&mut active, &next, sub_item, next_sub, same_item)
            .await;
        self.publish(active.as_ref());
        if result.is_ok() {
            debug!(item, sub_item, "administration item activated");
        }
        result
    }

    /// Close whatever is open.
    pub async fn deactivate(&self) -> Result<(), CoreError> {
        let mut active = self.active.lock().await;
        let Some(previous) = active.take() else {
            return Ok(());
        };
        let result = self.deactivate_entry(&previous, true).await;
        self.publish(None);
        result
    }

    /// Run the lifecycle hooks for moving to `next`. `active` tracks what is
    /// actually open after each hook, including when one fails.
    async fn switch(
        &self,
        active: &mut Option<ActiveItem>,
        next: &AdministrationItem,
        sub_item: Option<&str>,
        next_sub: Option<Option<Arc<dyn ItemLifecycle>>>,
        same_item: bool,
    ) -> Result<(), CoreError> {
        if let Some(previous) = active.take() {
            if same_item {
                *active = Some(ActiveItem {
                    item: previous.item.clone(),
                    sub_item: None,
                });
            }
            self.deactivate_entry(&previous, !same_item).await?;
        }

        if !same_item {
            run_activate(next.lifecycle.as_ref()).await?;
            *active = Some(ActiveItem {
                item: next.name.clone(),
                sub_item: None,
            });
        }
        if let Some(lifecycle) = next_sub {
            run_activate(lifecycle.as_ref()).await?;
            if let Some(entry) = active.as_mut() {
                entry.sub_item = sub_item.map(str::to_owned);
            }
        }
        Ok(())
    }

    fn publish(&self, active: Option<&ActiveItem>) {
        self.changes.send_if_modified(|current| {
            if current.as_ref() == active {
                return false;
            }
            *current = active.cloned();
            true
        });
    }

    async fn deactivate_entry(&self, entry: &ActiveItem, item_too: bool) -> Result<(), CoreError> {
        let Some(item) = self.registry.get_item(&entry.item) else {
            return Ok(());
        };
        if let Some(sub) = entry.sub_item.as_deref().and_then(|s| item.get_sub_item(s)) {
            run_deactivate(sub.lifecycle.as_ref()).await?;
        }
        if item_too {
            run_deactivate(item.lifecycle.as_ref()).await?;
        }
        Ok(())
    }

    /// Open the default item for the given mode.
    pub async fn activate_default(&self, configuration_wizard: bool) -> Result<Arc<AdministrationItem>, CoreError> {
        let item = self
            .registry
            .get_default_item(configuration_wizard)
            .ok_or_else(|| CoreError::not_found("administration item", "<default>"))?;
        self.activate(&item.name, None).await?;
        Ok(item)
    }
}

async fn run_activate(lifecycle: Option<&Arc<dyn ItemLifecycle>>) -> Result<(), CoreError> {
    match lifecycle {
        Some(l) => l.on_activate().await,
        None => Ok(()),
    }
}

async fn run_deactivate(lifecycle: Option<&Arc<dyn ItemLifecycle>>) -> Result<(), CoreError> {
    match lifecycle {
        Some(l) => l.on_deactivate().await,
        None => Ok(()),
    }
}

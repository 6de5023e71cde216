//! The administration items this client knows about.

use std::sync::Arc;

use async_trait::async_trait;

use dbweave_core::admin::{NoHooks, WizardStepHooks};
use dbweave_core::{
    AdministrationItem, AdministrationRegistry, AdministrationSubItem, CoreError, ItemKind,
    ServerConfigResource, WizardOptions,
};

/// The server settings step is done once the server has a name, either
/// already configured or pending in the draft.
struct ServerSettingsStep {
    server_config: ServerConfigResource,
}

#[async_trait]
impl WizardStepHooks for ServerSettingsStep {
    fn is_done(&self) -> bool {
        let drafted = self
            .server_config
            .draft()
            .server_name
            .is_some_and(|name| !name.trim().is_empty());
        let configured = self
            .server_config
            .resource()
            .data()
            .is_some_and(|config| !config.name.trim().is_empty());
        drafted || configured
    }
}

fn described(mut options: WizardOptions, description: &str) -> WizardOptions {
    options.description = Some(description.into());
    options
}

pub fn default_registry(server_config: &ServerConfigResource) -> Result<AdministrationRegistry, CoreError> {
    let mut builder = AdministrationRegistry::builder();
    builder
        .add(
            AdministrationItem::new("welcome")
                .kind(ItemKind::ConfigurationWizard)
                .order(0)
                .wizard(described(
                    WizardOptions::new(0, Arc::new(NoHooks)),
                    "Introduction to the initial server setup",
                )),
        )?
        .add(
            AdministrationItem::new("server-configuration")
                .order(1)
                .view("server-settings")
                .wizard(described(
                    WizardOptions::new(
                        1,
                        Arc::new(ServerSettingsStep {
                            server_config: server_config.clone(),
                        }),
                    ),
                    "Server name, URL and access policy",
                )),
        )?
        .add(
            AdministrationItem::new("connections")
                .kind(ItemKind::Administration)
                .order(2),
        )?
        .add(
            AdministrationItem::new("users")
                .kind(ItemKind::Administration)
                .order(3)
                .sub_item(AdministrationSubItem::new("users"))
                .sub_item(AdministrationSubItem::new("teams")),
        )?
        .add(
            AdministrationItem::new("finish")
                .kind(ItemKind::ConfigurationWizard)
                .order(100)
                .wizard(described(
                    WizardOptions::new(100, Arc::new(NoHooks)),
                    "Review and apply the configuration",
                )),
        )?;
    Ok(builder.build())
}

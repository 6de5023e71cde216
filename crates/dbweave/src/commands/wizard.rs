//! `dbweave wizard`: first-run server configuration.
//!
//! Step progress persists in the state directory between invocations, so
//! steps can be finished one command at a time.

use serde::Serialize;
use tabled::Tabled;

use dbweave_core::{ConfigurationWizard, Workbench};

use super::util;
use crate::admin;
use crate::cli::{GlobalOpts, WizardArgs, WizardCommand, WizardFinishArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StepStatus {
    name: String,
    description: Option<String>,
    finished: bool,
    available: bool,
    done: bool,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    name: String,
    #[tabled(rename = "Finished")]
    finished: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn status(wizard: &ConfigurationWizard) -> Vec<StepStatus> {
    let finished = wizard.finished_steps();
    wizard
        .steps()
        .iter()
        .map(|step| StepStatus {
            name: step.name.clone(),
            description: step.wizard.as_ref().and_then(|w| w.description.clone()),
            finished: finished.contains(&step.name),
            available: wizard.is_step_available(&step.name),
            done: step.is_done(),
        })
        .collect()
}

fn apply_draft(workbench: &Workbench, args: WizardFinishArgs) -> Result<(), CliError> {
    let admin_password = if args.admin_password {
        let secret = util::prompt_password("Administrator password: ")?;
        Some(secrecy::ExposeSecret::expose_secret(&secret).to_owned())
    } else {
        None
    };
    workbench.server_config().update_draft(|draft| {
        if args.server_name.is_some() {
            draft.server_name = args.server_name;
        }
        if args.server_url.is_some() {
            draft.server_url = args.server_url;
        }
        if args.admin_name.is_some() {
            draft.admin_name = args.admin_name;
        }
        if admin_password.is_some() {
            draft.admin_password = admin_password;
        }
        if args.anonymous.is_some() {
            draft.anonymous_access_enabled = args.anonymous;
        }
    });
    Ok(())
}

pub async fn handle(args: WizardArgs, workbench: &Workbench, global: &GlobalOpts) -> Result<(), CliError> {
    let config = workbench.server_config().resource().load().await?;
    let registry = admin::default_registry(workbench.server_config())?;
    let wizard = workbench.wizard(&registry)?;
    let color = output::should_color(&global.color);

    match args.command {
        WizardCommand::Status => {
            if !config.configuration_mode && !global.quiet {
                eprintln!("Server '{}' is already configured", config.name);
            }
            let steps = status(&wizard);
            let rendered = output::render_list(
                &global.output,
                &steps,
                |s| StepRow {
                    name: s.name.clone(),
                    finished: output::flag(s.finished, color),
                    available: output::flag(s.available, color),
                    description: s.description.clone().unwrap_or_default(),
                },
                |s| s.name.clone(),
            );
            output::print_output(&rendered, global.quiet);
        }

        WizardCommand::FinishStep { step } => {
            wizard.navigate_to(&step)?;
            let current = wizard
                .current_step()
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "wizard step".into(),
                    identifier: step.clone(),
                })?;
            if !current.is_done() {
                return Err(CliError::Validation {
                    field: step,
                    reason: "step input is incomplete".into(),
                });
            }
            if !wizard.finish_step(&step).await? {
                return Err(CliError::Validation {
                    field: step,
                    reason: "step did not accept its input".into(),
                });
            }
            if !global.quiet {
                eprintln!("Step '{step}' finished");
            }
        }

        WizardCommand::Finish(finish) => {
            if !config.configuration_mode {
                return Err(CliError::Validation {
                    field: "wizard".into(),
                    reason: format!("server '{}' is not in configuration mode", config.name),
                });
            }
            apply_draft(workbench, finish)?;
            // Walk forward through every step; the last one completes setup.
            wizard.start();
            loop {
                match wizard.next().await? {
                    dbweave_core::WizardTransition::Moved(_) => {}
                    dbweave_core::WizardTransition::Finished => break,
                    dbweave_core::WizardTransition::Stayed => {
                        let step = wizard
                            .current_step()
                            .map(|s| s.name.clone())
                            .unwrap_or_default();
                        return Err(CliError::Validation {
                            field: step,
                            reason: "step input is incomplete".into(),
                        });
                    }
                }
            }
            if !global.quiet {
                eprintln!("Server configuration applied");
            }
        }

        WizardCommand::Reset => {
            workbench
                .state_store()
                .remove(dbweave_core::wizard::WIZARD_STATE_KEY)?;
            if !global.quiet {
                eprintln!("Wizard progress cleared");
            }
        }
    }
    Ok(())
}

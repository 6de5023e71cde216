// ── Configuration wizard ──
//
// First-run setup as an ordered list of administration items. Progress
// (finished step names) is persisted so a restarted client resumes where
// the user left off; completion clears it.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::admin::{AdministrationItem, AdministrationRegistry};
use crate::error::CoreError;
use crate::persist::{self, StateStore};

/// State store key for wizard progress.
pub const WIZARD_STATE_KEY: &str = "configuration_wizard";

/// Persists the collected configuration when the wizard completes.
#[async_trait]
pub trait ServerConfigurator: Send + Sync {
    async fn finish_configuration(&self) -> Result<(), CoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    finished_steps: Vec<String>,
}

/// Outcome of [`ConfigurationWizard::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardTransition {
    /// The current step is incomplete or its finish hook refused.
    Stayed,
    /// Moved to the named step.
    Moved(String),
    /// The wizard completed.
    Finished,
}

struct Cursor {
    current: usize,
    finished: IndexSet<String>,
}

/// The setup wizard state machine.
pub struct ConfigurationWizard {
    steps: Vec<Arc<AdministrationItem>>,
    store: Arc<dyn StateStore>,
    configurator: Arc<dyn ServerConfigurator>,
    cursor: Mutex<Cursor>,
    active: watch::Sender<bool>,
}

impl ConfigurationWizard {
    /// Steps come from `registry`; finished steps are restored from `store`.
    pub fn new(
        registry: &AdministrationRegistry,
        store: Arc<dyn StateStore>,
        configurator: Arc<dyn ServerConfigurator>,
    ) -> Result<Self, CoreError> {
        let steps = registry.wizard_steps();
        let persisted: PersistedState = persist::load_or_default(store.as_ref(), WIZARD_STATE_KEY)?;
        let finished = persisted
            .finished_steps
            .into_iter()
            .filter(|name| steps.iter().any(|s| &s.name == name))
            .collect();

        Ok(Self {
            steps,
            store,
            configurator,
            cursor: Mutex::new(Cursor {
                current: 0,
                finished,
            }),
            active: watch::channel(false).0,
        })
    }

    fn cursor(&self) -> std::sync::MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Mode ─────────────────────────────────────────────────────────

    /// Enter wizard mode at the first step.
    pub fn start(&self) {
        self.cursor().current = 0;
        self.active.send_replace(true);
        info!(steps = self.steps.len(), "configuration wizard started");
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    pub fn watch_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn steps(&self) -> &[Arc<AdministrationItem>] {
        &self.steps
    }

    pub fn current_step(&self) -> Option<Arc<AdministrationItem>> {
        self.steps.get(self.cursor().current).cloned()
    }

    pub fn finished_steps(&self) -> Vec<String> {
        self.cursor().finished.iter().cloned().collect()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// A step is reachable when it is current, already finished, or every
    /// step before it is done.
    pub fn is_step_available(&self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        {
            let cursor = self.cursor();
            if cursor.current == index || cursor.finished.contains(name) {
                return true;
            }
        }
        self.steps[..index].iter().all(|s| s.is_done())
    }

    pub fn can_finish(&self) -> bool {
        self.steps.iter().all(|s| s.is_done())
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Finish the current step and advance, or complete the wizard from
    /// the last step.
    pub async fn next(&self) -> Result<WizardTransition, CoreError> {
        let Some(step) = self.current_step() else {
            return Ok(WizardTransition::Stayed);
        };
        if !step.is_done() || !self.finish_step(&step.name).await? {
            debug!(step = %step.name, "wizard step not complete");
            return Ok(WizardTransition::Stayed);
        }

        let index = self.index_of(&step.name).unwrap_or_default();
        match self.steps.get(index + 1) {
            Some(next) => {
                self.cursor().current = index + 1;
                debug!(step = %next.name, "wizard advanced");
                Ok(WizardTransition::Moved(next.name.clone()))
            }
            None => {
                self.finish().await?;
                Ok(WizardTransition::Finished)
            }
        }
    }

    /// Step back without running any hooks. `None` on the first step.
    pub fn back(&self) -> Option<String> {
        let mut cursor = self.cursor();
        let previous = cursor.current.checked_sub(1)?;
        cursor.current = previous;
        self.steps.get(previous).map(|s| s.name.clone())
    }

    /// Jump to an available step.
    pub fn navigate_to(&self, name: &str) -> Result<(), CoreError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| CoreError::not_found("wizard step", name))?;
        if !self.is_step_available(name) {
            return Err(CoreError::ValidationFailed {
                message: format!("wizard step is locked: {name}"),
            });
        }
        self.cursor().current = index;
        Ok(())
    }

    /// Run the step's finish hook and record it as finished. Recording is
    /// idempotent. Returns `false` if the hook kept the step open.
    pub async fn finish_step(&self, name: &str) -> Result<bool, CoreError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| CoreError::not_found("wizard step", name))?;
        if let Some(options) = &self.steps[index].wizard {
            if !options.hooks.on_finish().await? {
                return Ok(false);
            }
        }

        let snapshot = {
            let mut cursor = self.cursor();
            if !cursor.finished.insert(name.to_owned()) {
                return Ok(true);
            }
            PersistedState {
                finished_steps: cursor.finished.iter().cloned().collect(),
            }
        };
        persist::save_as(self.store.as_ref(), WIZARD_STATE_KEY, &snapshot)?;
        debug!(step = name, "wizard step finished");
        Ok(true)
    }

    /// Complete setup: run every finished step's completion hook, persist
    /// the server configuration, clear progress and leave wizard mode.
    pub async fn finish(&self) -> Result<(), CoreError> {
        if !self.can_finish() {
            return Err(CoreError::ValidationFailed {
                message: "configuration wizard has incomplete steps".into(),
            });
        }

        let finished = self.finished_steps();
        for step in self.steps.iter().filter(|s| finished.contains(&s.name)) {
            if let Some(options) = &step.wizard {
                options.hooks.on_configuration_finish().await?;
            }
        }
        self.configurator.finish_configuration().await?;

        self.store.remove(WIZARD_STATE_KEY)?;
        {
            let mut cursor = self.cursor();
            cursor.finished.clear();
            cursor.current = 0;
        }
        self.active.send_replace(false);
        info!("configuration wizard finished");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::admin::{ItemKind, NoHooks, WizardOptions, WizardStepHooks};
    use crate::persist::MemoryStateStore;

    /// A welcome page whose form is incomplete until `filled` is set.
    #[derive(Default)]
    struct WelcomeForm {
        filled: AtomicBool,
        finishes: AtomicU32,
        completions: AtomicU32,
    }

    #[async_trait]
    impl WizardStepHooks for WelcomeForm {
        fn is_done(&self) -> bool {
            self.filled.load(Ordering::SeqCst)
        }

        async fn on_finish(&self) -> Result<bool, CoreError> {
            self.finishes.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn on_configuration_finish(&self) -> Result<(), CoreError> {
            self.completions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingConfigurator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ServerConfigurator for RecordingConfigurator {
        async fn finish_configuration(&self) -> Result<(), CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        wizard: ConfigurationWizard,
        welcome: Arc<WelcomeForm>,
        configurator: Arc<RecordingConfigurator>,
        store: Arc<MemoryStateStore>,
    }

    fn registry(welcome: &Arc<WelcomeForm>) -> AdministrationRegistry {
        let mut builder = AdministrationRegistry::builder();
        builder
            .add(
                AdministrationItem::new("finish")
                    .kind(ItemKind::ConfigurationWizard)
                    .wizard(WizardOptions::new(2, Arc::new(NoHooks))),
            )
            .unwrap()
            .add(
                AdministrationItem::new("welcome")
                    .kind(ItemKind::ConfigurationWizard)
                    .wizard(WizardOptions::new(1, welcome.clone())),
            )
            .unwrap()
            .add(AdministrationItem::new("users").kind(ItemKind::Administration))
            .unwrap();
        builder.build()
    }

    fn fixture() -> Fixture {
        let welcome = Arc::new(WelcomeForm::default());
        let configurator = Arc::new(RecordingConfigurator::default());
        let store = Arc::new(MemoryStateStore::new());
        let wizard =
            ConfigurationWizard::new(&registry(&welcome), store.clone(), configurator.clone())
                .unwrap();
        wizard.start();
        Fixture {
            wizard,
            welcome,
            configurator,
            store,
        }
    }

    #[tokio::test]
    async fn welcome_then_finish_scenario() {
        let f = fixture();
        let names: Vec<&str> = f.wizard.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["welcome", "finish"]);

        assert!(!f.wizard.can_finish());
        assert!(!f.wizard.is_step_available("finish"));
        assert_eq!(f.wizard.next().await.unwrap(), WizardTransition::Stayed);

        f.welcome.filled.store(true, Ordering::SeqCst);
        assert!(f.wizard.can_finish());
        assert!(f.wizard.is_step_available("finish"));
        assert_eq!(
            f.wizard.next().await.unwrap(),
            WizardTransition::Moved("finish".into())
        );
        assert!(f.wizard.is_active());

        assert_eq!(f.wizard.next().await.unwrap(), WizardTransition::Finished);
        assert!(!f.wizard.is_active());
        assert_eq!(f.configurator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.welcome.completions.load(Ordering::SeqCst), 1);
        assert!(f.wizard.finished_steps().is_empty());
        assert!(f.store.load(WIZARD_STATE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_step_is_idempotent() {
        let f = fixture();
        f.wizard.finish_step("welcome").await.unwrap();
        f.wizard.finish_step("welcome").await.unwrap();

        assert_eq!(f.wizard.finished_steps(), vec!["welcome".to_owned()]);
        assert_eq!(f.welcome.finishes.load(Ordering::SeqCst), 2);
        assert_eq!(
            f.store.load(WIZARD_STATE_KEY).unwrap(),
            Some(serde_json::json!({ "finishedSteps": ["welcome"] }))
        );
    }

    #[tokio::test]
    async fn progress_survives_restart() {
        let f = fixture();
        f.welcome.filled.store(true, Ordering::SeqCst);
        f.wizard.next().await.unwrap();

        let reopened =
            ConfigurationWizard::new(&registry(&f.welcome), f.store.clone(), f.configurator.clone())
                .unwrap();
        assert_eq!(reopened.finished_steps(), vec!["welcome".to_owned()]);
    }

    #[tokio::test]
    async fn back_and_navigate() {
        let f = fixture();
        assert_eq!(f.wizard.back(), None);
        assert!(f.wizard.navigate_to("finish").is_err());

        f.welcome.filled.store(true, Ordering::SeqCst);
        f.wizard.navigate_to("finish").unwrap();
        assert_eq!(f.wizard.current_step().unwrap().name, "finish");
        assert_eq!(f.wizard.back().as_deref(), Some("welcome"));
        assert_eq!(f.configurator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn finish_refuses_incomplete_steps() {
        let f = fixture();
        assert!(f.wizard.finish().await.is_err());
        assert!(f.wizard.is_active());
        assert_eq!(f.configurator.calls.load(Ordering::SeqCst), 0);
    }
}

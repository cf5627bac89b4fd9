/// Panel state: the one object every component reads and writes through.
///
/// The terminal UI only renders from `PanelState` and feeds key presses into
/// it; the dispatcher drives it through `begin`/`complete`. Nothing here
/// touches the terminal, so state transitions are testable on their own.
pub mod busy;
pub mod console;
pub mod stack_list;
pub mod tabs;

use tracing::info;

use crate::actions::{ActionCompletion, ActionContext};
use crate::client::ConnectionSettings;
use crate::config::ResolvedConfig;
use crate::prefs::{PrefKey, PreferenceStore};
use crate::stack::PortEncoding;

use busy::BusyLock;
use console::ResponseConsole;
use stack_list::StackListView;
use tabs::{Cycle, Tab, TabController};

// ── Form inputs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    BaseUrl,
    ApiKey,
    TargetPort,
    PodSpec,
    StackId,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::BaseUrl => "base url",
            Field::ApiKey => "api key",
            Field::TargetPort => "target port",
            Field::PodSpec => "pod spec",
            Field::StackId => "stack id",
        }
    }

    pub fn multiline(self) -> bool {
        self == Field::PodSpec
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub base_url: String,
    pub api_key: String,
    pub api_key_enabled: bool,
    pub stack_id: String,
    pub last_stack_id: String,
    pub target_port: String,
    pub pod_spec: String,
}

impl Inputs {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::BaseUrl => &self.base_url,
            Field::ApiKey => &self.api_key,
            Field::TargetPort => &self.target_port,
            Field::PodSpec => &self.pod_spec,
            Field::StackId => &self.stack_id,
        }
    }

    fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::BaseUrl => &mut self.base_url,
            Field::ApiKey => &mut self.api_key,
            Field::TargetPort => &mut self.target_port,
            Field::PodSpec => &mut self.pod_spec,
            Field::StackId => &mut self.stack_id,
        }
    }
}

// ── PanelState ────────────────────────────────────────────────────────────────

pub struct PanelState {
    pub busy: BusyLock,
    pub console: ResponseConsole,
    pub stacks: StackListView,
    pub tabs: TabController,
    pub inputs: Inputs,
    pub prefs: PreferenceStore,
    origin: String,
    encoding: PortEncoding,
}

impl PanelState {
    pub fn new(config: &ResolvedConfig, prefs: PreferenceStore) -> Self {
        let api_key = config
            .api_key_override
            .clone()
            .or_else(|| prefs.get(PrefKey::ApiKey).map(str::to_string))
            .or_else(|| config.file_api_key.clone())
            .unwrap_or_default();
        let api_key_enabled = prefs.get_bool(PrefKey::ApiKeyEnabled).unwrap_or(true);
        let tabs = TabController::restore(&prefs, config.default_tab);

        Self {
            busy: BusyLock::default(),
            console: ResponseConsole::default(),
            stacks: StackListView::default(),
            tabs,
            inputs: Inputs {
                base_url: config.base_url.clone(),
                api_key,
                api_key_enabled,
                stack_id: String::new(),
                last_stack_id: String::new(),
                target_port: "80".to_string(),
                pod_spec: config.pod_spec.clone(),
            },
            prefs,
            origin: config.base_url.clone(),
            encoding: config.encoding,
        }
    }

    pub fn encoding(&self) -> PortEncoding {
        self.encoding
    }

    pub fn connection(&self) -> ConnectionSettings {
        ConnectionSettings::new(
            &self.inputs.base_url,
            &self.origin,
            &self.inputs.api_key,
            self.inputs.api_key_enabled,
        )
    }

    // ── Inputs ────────────────────────────────────────────────────────────────

    pub fn set_input(&mut self, field: Field, value: String) {
        *self.inputs.get_mut(field) = value;
        if field == Field::ApiKey {
            self.prefs.set(PrefKey::ApiKey, self.inputs.api_key.clone());
        }
    }

    pub fn toggle_api_key_enabled(&mut self) {
        self.inputs.api_key_enabled = !self.inputs.api_key_enabled;
        self.prefs.set_bool(PrefKey::ApiKeyEnabled, self.inputs.api_key_enabled);
    }

    /// Copy a server-assigned id into every field single-stack actions read.
    pub fn propagate_stack_id(&mut self, stack_id: &str) {
        if stack_id.is_empty() {
            return;
        }
        self.inputs.last_stack_id = stack_id.to_string();
        self.inputs.stack_id = stack_id.to_string();
    }

    // ── Tabs ──────────────────────────────────────────────────────────────────

    pub fn activate_tab(&mut self, tab: Tab) {
        self.tabs.activate(tab, &mut self.prefs);
    }

    pub fn cycle_tab(&mut self, dir: Cycle) -> Tab {
        self.tabs.cycle(dir, &mut self.prefs)
    }

    // ── Action lifecycle ──────────────────────────────────────────────────────

    /// Engage the busy lock, post the interim record, and snapshot the inputs
    /// the handler will run against.
    pub fn begin(&mut self, title: &str, target: Option<String>) -> ActionContext {
        self.busy.engage();
        self.console.post_running(title);
        info!(action = title, "action started");
        ActionContext {
            settings: self.connection(),
            stack_id: self.inputs.stack_id.clone(),
            target,
            target_port: self.inputs.target_port.clone(),
            pod_spec: self.inputs.pod_spec.clone(),
            encoding: self.encoding,
        }
    }

    /// Route an outcome to the console and list view, then release the lock.
    pub fn complete(&mut self, completion: ActionCompletion) {
        let ActionCompletion { id, title, outcome } = completion;

        if let Some(listing) = outcome.listing {
            match listing {
                Ok(stacks) => self.stacks.render(&stacks),
                Err(msg) => self.stacks.render_placeholder(msg),
            }
        }

        match outcome.result {
            Ok(output) => {
                if let Some(stack_id) = &output.created_stack_id {
                    self.propagate_stack_id(stack_id);
                }
                info!(action = id.as_str(), "action succeeded");
                self.console.post_success(&title, &output.record);
            }
            Err(err) => {
                info!(action = id.as_str(), kind = err.kind().label(), error = %err, "action failed");
                self.console.post_error(&title, &err);
            }
        }

        self.busy.release();
    }
}

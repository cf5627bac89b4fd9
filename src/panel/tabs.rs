/// TabController: exactly one active panel, persisted through the preference store.
use crate::prefs::{PrefKey, PreferenceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Settings,
    Stacks,
    Create,
    Inspect,
    Service,
}

pub const DEFAULT_TAB: Tab = Tab::Settings;

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Settings, Tab::Stacks, Tab::Create, Tab::Inspect, Tab::Service];

    pub fn id(self) -> &'static str {
        match self {
            Tab::Settings => "settings",
            Tab::Stacks => "stacks",
            Tab::Create => "create",
            Tab::Inspect => "inspect",
            Tab::Service => "service",
        }
    }

    pub fn from_id(id: &str) -> Option<Tab> {
        Tab::ALL.into_iter().find(|t| t.id() == id.trim())
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Settings => "Settings",
            Tab::Stacks => "Stacks",
            Tab::Create => "Create",
            Tab::Inspect => "Inspect",
            Tab::Service => "Service",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Left,
    Right,
}

#[derive(Debug)]
pub struct TabController {
    active: Tab,
}

impl TabController {
    /// Last persisted tab, else `fallback`.
    pub fn restore(prefs: &PreferenceStore, fallback: Tab) -> Self {
        let active = prefs
            .get(PrefKey::ActiveTab)
            .and_then(Tab::from_id)
            .unwrap_or(fallback);
        Self { active }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Selected/active marker for a tab control and its panel.
    pub fn is_active(&self, tab: Tab) -> bool {
        self.active == tab
    }

    pub fn activate(&mut self, tab: Tab, prefs: &mut PreferenceStore) {
        self.active = tab;
        prefs.set(PrefKey::ActiveTab, tab.id());
    }

    /// Move to the neighbouring tab, wrapping at both ends, and activate it.
    pub fn cycle(&mut self, dir: Cycle, prefs: &mut PreferenceStore) -> Tab {
        let n = Tab::ALL.len();
        let idx = self.active.index();
        let next = match dir {
            Cycle::Right => (idx + 1) % n,
            Cycle::Left => (idx + n - 1) % n,
        };
        let tab = Tab::ALL[next];
        self.activate(tab, prefs);
        tab
    }
}

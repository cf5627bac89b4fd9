/// StackListView: full-snapshot rendering of stack summaries into cards.
use crate::actions::{ActionId, ActionTrigger};
use crate::stack::{
    StackSummary, StatusClass, format_bytes, format_cpu_milli, format_ports, format_text,
    format_timestamp,
};

pub const NO_RESULTS: &str = "no stacks";
pub const NOT_LOADED: &str = "not loaded yet (press r to refresh)";

/// Delete button of one card. Carries the id as data; activating it always
/// goes through the delete-then-refresh composite action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteControl {
    pub stack_id: String,
}

impl DeleteControl {
    pub fn trigger(&self) -> ActionTrigger {
        ActionTrigger::targeted(ActionId::DeleteItem, &self.stack_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackCard {
    pub stack_id: String,
    pub status: String,
    pub status_class: StatusClass,
    pub fields: Vec<(&'static str, String)>,
    pub delete: DeleteControl,
}

impl StackCard {
    pub fn from_summary(s: &StackSummary) -> Self {
        let fields = vec![
            ("namespace", format_text(s.namespace.as_deref())),
            ("pod", format_text(s.pod_id.as_deref())),
            ("service", format_text(s.service_name.as_deref())),
            ("node", format_text(s.node_id.as_deref())),
            ("public ip", format_text(s.node_public_ip.as_deref())),
            ("ports", format_ports(s)),
            ("cpu", format_cpu_milli(s.requested_cpu_milli)),
            ("memory", format_bytes(s.requested_memory_bytes)),
            ("ttl", format_timestamp(s.ttl_expires_at.as_deref())),
            ("created", format_timestamp(s.created_at.as_deref())),
            ("updated", format_timestamp(s.updated_at.as_deref())),
        ];
        Self {
            stack_id: format_text(Some(&s.stack_id)),
            status: format_text(s.status.as_deref()),
            status_class: StatusClass::of(s.status.as_deref()),
            fields,
            delete: DeleteControl { stack_id: s.stack_id.clone() },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListContent {
    Placeholder(String),
    Cards(Vec<StackCard>),
}

#[derive(Debug)]
pub struct StackListView {
    content: ListContent,
    selected: usize,
}

impl Default for StackListView {
    fn default() -> Self {
        Self { content: ListContent::Placeholder(NOT_LOADED.to_string()), selected: 0 }
    }
}

impl StackListView {
    /// Replace everything with one card per entry, in input order.
    pub fn render(&mut self, stacks: &[StackSummary]) {
        self.content = if stacks.is_empty() {
            ListContent::Placeholder(NO_RESULTS.to_string())
        } else {
            ListContent::Cards(stacks.iter().map(StackCard::from_summary).collect())
        };
        self.selected = self.selected.min(self.cards().len().saturating_sub(1));
    }

    pub fn render_placeholder(&mut self, message: impl Into<String>) {
        self.content = ListContent::Placeholder(message.into());
        self.selected = 0;
    }

    pub fn content(&self) -> &ListContent {
        &self.content
    }

    pub fn cards(&self) -> &[StackCard] {
        match &self.content {
            ListContent::Cards(cards) => cards,
            ListContent::Placeholder(_) => &[],
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.cards().len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_card(&self) -> Option<&StackCard> {
        self.cards().get(self.selected)
    }
}

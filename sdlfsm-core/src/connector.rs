//! Action connectors: graph nodes binding an action to its successors.

use crate::action::Action;
use crate::error::CoreError;
use crate::names_db::ElementId;
use std::sync::Arc;

/// Branch selected by a switch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchBranch {
    Default,
    /// 1-based index into the registered switch cases.
    Case(usize),
}

/// Result of executing one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Stop,
    Next,
    AltNext,
    Switch(SwitchBranch),
}

/// Outgoing link slot of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSlot {
    Next,
    AltNext,
    DefaultSwitch,
    SwitchCase,
}

impl LinkSlot {
    fn as_str(&self) -> &'static str {
        match self {
            LinkSlot::Next => "next",
            LinkSlot::AltNext => "alt-next",
            LinkSlot::DefaultSwitch => "default switch",
            LinkSlot::SwitchCase => "switch case",
        }
    }
}

/// Outgoing links. A connector is either linear or a switch, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Links {
    Linear {
        next: Option<ElementId>,
        alt_next: Option<ElementId>,
    },
    Switch {
        default: Option<ElementId>,
        cases: Vec<ElementId>,
    },
}

/// A node of the execution graph.
#[derive(Debug, Clone)]
pub struct ActionConnector {
    id: ElementId,
    action: Arc<Action>,
    links: Links,
}

impl ActionConnector {
    /// Creates an unlinked connector. Switch conditions get switch links.
    pub fn new(id: ElementId, action: Action) -> Self {
        let links = if action.is_switch() {
            Links::Switch {
                default: None,
                cases: Vec::new(),
            }
        } else {
            Links::Linear {
                next: None,
                alt_next: None,
            }
        };
        Self {
            id,
            action: Arc::new(action),
            links,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub(crate) fn shared_action(&self) -> Arc<Action> {
        Arc::clone(&self.action)
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.links, Links::Switch { .. })
    }

    pub fn next_id(&self) -> Option<ElementId> {
        match self.links {
            Links::Linear { next, .. } => next,
            Links::Switch { .. } => None,
        }
    }

    pub fn alt_next_id(&self) -> Option<ElementId> {
        match self.links {
            Links::Linear { alt_next, .. } => alt_next,
            Links::Switch { .. } => None,
        }
    }

    pub fn default_switch_id(&self) -> Option<ElementId> {
        match self.links {
            Links::Switch { default, .. } => default,
            Links::Linear { .. } => None,
        }
    }

    pub fn switch_case_ids(&self) -> &[ElementId] {
        match &self.links {
            Links::Switch { cases, .. } => cases,
            Links::Linear { .. } => &[],
        }
    }

    /// Checks that `slot` can be linked on this connector.
    pub fn check_slot(&self, slot: LinkSlot) -> Result<(), CoreError> {
        let occupied = match (&self.links, slot) {
            (Links::Linear { next, .. }, LinkSlot::Next) => next.is_some(),
            (Links::Linear { alt_next, .. }, LinkSlot::AltNext) => alt_next.is_some(),
            (Links::Switch { default, .. }, LinkSlot::DefaultSwitch) => default.is_some(),
            (Links::Switch { .. }, LinkSlot::SwitchCase) => false,
            (Links::Linear { .. }, _) => {
                return Err(CoreError::InvalidGraph {
                    reason: format!(
                        "connector {} is linear and has no {} link",
                        self.id,
                        slot.as_str()
                    ),
                })
            }
            (Links::Switch { .. }, _) => {
                return Err(CoreError::InvalidGraph {
                    reason: format!(
                        "connector {} is a switch and has no {} link",
                        self.id,
                        slot.as_str()
                    ),
                })
            }
        };
        if occupied {
            return Err(CoreError::InvalidGraph {
                reason: format!("connector {} already has a {} link", self.id, slot.as_str()),
            });
        }
        Ok(())
    }

    /// Links `target` into `slot`. Switch cases are appended in call order.
    pub fn link(&mut self, slot: LinkSlot, target: ElementId) -> Result<(), CoreError> {
        self.check_slot(slot)?;
        match (&mut self.links, slot) {
            (Links::Linear { next, .. }, LinkSlot::Next) => *next = Some(target),
            (Links::Linear { alt_next, .. }, LinkSlot::AltNext) => *alt_next = Some(target),
            (Links::Switch { default, .. }, LinkSlot::DefaultSwitch) => *default = Some(target),
            (Links::Switch { cases, .. }, LinkSlot::SwitchCase) => cases.push(target),
            _ => unreachable!("slot checked above"),
        }
        Ok(())
    }

    /// Resolves the connector selected by `flow`; `None` ends the chain.
    pub(crate) fn successor(&self, flow: Flow) -> Result<Option<ElementId>, CoreError> {
        let dangling = |branch: String| CoreError::DanglingLink {
            connector: self.id,
            branch,
        };
        match (flow, &self.links) {
            (Flow::Stop, _) => Ok(None),
            (Flow::Next, Links::Linear { next, .. }) => {
                next.map(Some).ok_or_else(|| dangling("next".to_string()))
            }
            (Flow::AltNext, Links::Linear { alt_next, .. }) => alt_next
                .map(Some)
                .ok_or_else(|| dangling("alt-next".to_string())),
            (Flow::Switch(SwitchBranch::Default), Links::Switch { default, .. }) => default
                .map(Some)
                .ok_or_else(|| dangling("default switch".to_string())),
            (Flow::Switch(SwitchBranch::Case(index)), Links::Switch { cases, .. }) => index
                .checked_sub(1)
                .and_then(|i| cases.get(i))
                .map(|id| Some(*id))
                .ok_or_else(|| dangling(format!("switch case {}", index))),
            (flow, _) => Err(CoreError::InvalidGraph {
                reason: format!("flow {:?} does not match the links of connector {}", flow, self.id),
            }),
        }
    }
}

// src/collision.rs
//
// Contact batch filtering on the host's contact delivery thread.
//
// The observer only ever raises a latch; the tick thread drains it at the
// top of the next tick and decides whether it still applies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::config::CollisionConfig;
use crate::types::Contact;

/// Result of filtering one contact batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactOutcome {
    /// The engine was in the scripted reset; the batch was not inspected.
    Ignored,
    /// No contact paired the target with the gripper.
    NoMatch,
    /// Contact at `index` paired the target with the gripper.
    GoalReached { index: usize },
}

/// Cross-thread state shared between the observer and the engine.
#[derive(Debug, Default)]
pub struct ContactSignal {
    /// Mirror of `ControlMode::AgentDriven`, written by the tick thread.
    agent_driven: AtomicBool,
    goal: AtomicBool,
    matched: Mutex<Option<Contact>>,
}

impl ContactSignal {
    pub fn set_agent_driven(&self, agent_driven: bool) {
        self.agent_driven.store(agent_driven, Ordering::Release);
    }

    pub fn is_agent_driven(&self) -> bool {
        self.agent_driven.load(Ordering::Acquire)
    }

    /// Take the goal latch, returning the contact that raised it.
    pub fn drain(&self) -> Option<Contact> {
        if !self.goal.swap(false, Ordering::AcqRel) {
            return None;
        }
        let contact = self
            .matched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Some(contact.unwrap_or_else(|| Contact::new("", "")))
    }

    pub fn is_latched(&self) -> bool {
        self.goal.load(Ordering::Acquire)
    }

    fn latch(&self, contact: Contact) {
        *self.matched.lock().unwrap_or_else(PoisonError::into_inner) = Some(contact);
        self.goal.store(true, Ordering::Release);
    }
}

/// Filters contact batches against the ground plane and the goal pair.
#[derive(Debug, Clone)]
pub struct CollisionObserver {
    cfg: CollisionConfig,
    signal: Arc<ContactSignal>,
}

impl CollisionObserver {
    pub fn new(cfg: CollisionConfig, signal: Arc<ContactSignal>) -> Self {
        Self { cfg, signal }
    }

    pub fn signal(&self) -> &Arc<ContactSignal> {
        &self.signal
    }

    fn is_goal_pair(&self, contact: &Contact) -> bool {
        let target = self.cfg.target_surface.as_str();
        let gripper = self.cfg.gripper_surface.as_str();
        (contact.collision1 == target && contact.collision2 == gripper)
            || (contact.collision1 == gripper && contact.collision2 == target)
    }

    /// Scan one batch. The first qualifying contact latches the goal and
    /// ends the scan.
    pub fn ingest_contacts(&self, contacts: &[Contact]) -> ContactOutcome {
        if !self.signal.is_agent_driven() {
            return ContactOutcome::Ignored;
        }

        for (index, contact) in contacts.iter().enumerate() {
            if contact.collision2 == self.cfg.ground_filter {
                continue;
            }
            if self.is_goal_pair(contact) {
                debug!(
                    "[collision] goal contact {} <-> {}",
                    contact.collision1, contact.collision2
                );
                self.signal.latch(contact.clone());
                return ContactOutcome::GoalReached { index };
            }
        }
        ContactOutcome::NoMatch
    }
}

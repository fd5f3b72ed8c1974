// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory slot accounting and wait-lists for agent queues.
//!
//! The board is the single gatekeeper for queue capacity: a slot is
//! taken here before the `WithAgent` state is persisted, and put back
//! here if the persist fails, so the per-queue concurrency budget can
//! never be overdrawn. Conversations that do not fit park on a FIFO
//! wait-list; every freed slot re-evaluates only the wait-list head.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use switchboard_config::model::QueueConfig;
use switchboard_core::SwitchboardError;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct AgentSlot {
    id: String,
    active: usize,
    /// Monotonic mark of the last assignment; round-robin picks the
    /// smallest.
    last_assigned: u64,
    /// Configured queue members get auto-assignments. Agents that enter
    /// through a claim, a transfer, or a startup restore are tracked
    /// only while they hold work.
    roster: bool,
}

struct WaitEntry {
    conversation_id: String,
    since: Instant,
}

struct QueueState {
    display_name: String,
    max_slots: usize,
    agents: Vec<AgentSlot>,
    waiting: VecDeque<WaitEntry>,
}

impl QueueState {
    fn total_active(&self) -> usize {
        self.agents.iter().map(|a| a.active).sum()
    }

    /// Index of the round-robin pick, if any roster agent can take one
    /// more.
    ///
    /// An agent is eligible when its own load is below the per-agent
    /// share and the queue total is below `max_slots`. Off-roster
    /// holders count against the total but never receive work here.
    fn eligible_agent(&self) -> Option<usize> {
        if self.total_active() >= self.max_slots {
            return None;
        }
        let roster_len = self.agents.iter().filter(|a| a.roster).count();
        if roster_len == 0 {
            return None;
        }
        let share = (self.max_slots / roster_len).max(1);
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.roster && a.active < share)
            .min_by_key(|(_, a)| a.last_assigned)
            .map(|(idx, _)| idx)
    }

    /// Count a slot against `agent_id`, adding the agent off-roster if
    /// the config does not list them.
    fn take_slot_for(&mut self, agent_id: &str, tick: u64) {
        match self.agents.iter_mut().find(|a| a.id == agent_id) {
            Some(agent) => {
                agent.active += 1;
                agent.last_assigned = tick;
            }
            None => {
                self.agents.push(AgentSlot {
                    id: agent_id.to_string(),
                    active: 1,
                    last_assigned: tick,
                    roster: false,
                });
            }
        }
    }

    /// Forget an off-roster agent once they hold nothing.
    fn drop_idle_off_roster(&mut self, agent_id: &str) {
        self.agents
            .retain(|a| a.id != agent_id || a.roster || a.active > 0);
    }
}

struct BoardInner {
    queues: HashMap<String, QueueState>,
    tick: u64,
}

/// The outcome of an automatic assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// A slot was taken; the conversation belongs to this agent now.
    Assigned(String),
    /// No eligible agent; the conversation sits at this wait-list depth.
    Parked { depth: usize },
}

/// Live occupancy snapshot of one queue, for the introspection surface.
#[derive(Debug, Clone, Serialize)]
pub struct QueueOccupancy {
    pub queue_id: String,
    pub display_name: String,
    pub max_slots: usize,
    pub active: usize,
    pub waiting: usize,
    pub agents: Vec<AgentOccupancy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentOccupancy {
    pub agent_id: String,
    pub active: usize,
}

/// A starvation advisory produced by the sweep.
#[derive(Debug, Clone)]
pub struct StarvingQueue {
    pub queue_id: String,
    pub waiting: usize,
    pub oldest_wait: Duration,
}

/// Slot counters and wait-lists for every configured queue.
pub struct QueueBoard {
    inner: Mutex<BoardInner>,
}

impl QueueBoard {
    pub fn new(queues: &[QueueConfig]) -> Self {
        let queues = queues
            .iter()
            .map(|q| {
                let state = QueueState {
                    display_name: q.display_name().to_string(),
                    max_slots: q.max_concurrent_slots as usize,
                    agents: q
                        .agents
                        .iter()
                        .map(|id| AgentSlot {
                            id: id.clone(),
                            active: 0,
                            last_assigned: 0,
                            roster: true,
                        })
                        .collect(),
                    waiting: VecDeque::new(),
                };
                (q.id.clone(), state)
            })
            .collect();
        Self {
            inner: Mutex::new(BoardInner { queues, tick: 0 }),
        }
    }

    /// Assign round-robin if a slot is free, otherwise park at the tail.
    pub async fn request_assignment(
        &self,
        queue_id: &str,
        conversation_id: &str,
    ) -> Result<AssignOutcome, SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let tick = next_tick(&mut inner);
        let queue = queue_mut(&mut inner, queue_id)?;
        match queue.eligible_agent() {
            Some(idx) => {
                let agent = &mut queue.agents[idx];
                agent.active += 1;
                agent.last_assigned = tick;
                Ok(AssignOutcome::Assigned(agent.id.clone()))
            }
            None => {
                queue.waiting.push_back(WaitEntry {
                    conversation_id: conversation_id.to_string(),
                    since: Instant::now(),
                });
                Ok(AssignOutcome::Parked {
                    depth: queue.waiting.len(),
                })
            }
        }
    }

    /// Take a slot for an explicit agent claim.
    ///
    /// Respects the queue total but not the round-robin share or the
    /// roster: a human opting in overrides fairness, never capacity.
    /// Removes the conversation from the wait-list if it is parked
    /// there.
    pub async fn claim(
        &self,
        queue_id: &str,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<(), SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let tick = next_tick(&mut inner);
        let queue = queue_mut(&mut inner, queue_id)?;
        if queue.total_active() >= queue.max_slots {
            return Err(SwitchboardError::CapacityExhausted {
                queue_id: queue_id.to_string(),
            });
        }
        queue.take_slot_for(agent_id, tick);
        queue
            .waiting
            .retain(|entry| entry.conversation_id != conversation_id);
        Ok(())
    }

    /// Move one active conversation between two agents.
    ///
    /// The queue total is unchanged, so no capacity check applies; the
    /// receiving agent need not be on the roster.
    pub async fn transfer(
        &self,
        queue_id: &str,
        from_agent: &str,
        to_agent: &str,
    ) -> Result<(), SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let tick = next_tick(&mut inner);
        let queue = queue_mut(&mut inner, queue_id)?;
        if let Some(from) = queue.agents.iter_mut().find(|a| a.id == from_agent) {
            from.active = from.active.saturating_sub(1);
        }
        queue.drop_idle_off_roster(from_agent);
        queue.take_slot_for(to_agent, tick);
        Ok(())
    }

    /// Give an agent's slot back without touching the wait-list.
    pub async fn release_slot(
        &self,
        queue_id: &str,
        agent_id: &str,
    ) -> Result<(), SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let queue = queue_mut(&mut inner, queue_id)?;
        if let Some(agent) = queue.agents.iter_mut().find(|a| a.id == agent_id) {
            agent.active = agent.active.saturating_sub(1);
        }
        queue.drop_idle_off_roster(agent_id);
        Ok(())
    }

    /// Serve the wait-list head if an agent can take it.
    ///
    /// Only the head is considered; callers loop on this after freeing
    /// slots. The returned pair already holds the slot.
    pub async fn pop_assignable(
        &self,
        queue_id: &str,
    ) -> Result<Option<(String, String)>, SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let tick = next_tick(&mut inner);
        let queue = queue_mut(&mut inner, queue_id)?;
        if queue.waiting.is_empty() {
            return Ok(None);
        }
        let Some(idx) = queue.eligible_agent() else {
            return Ok(None);
        };
        // Checked non-empty above.
        let Some(entry) = queue.waiting.pop_front() else {
            return Ok(None);
        };
        let agent = &mut queue.agents[idx];
        agent.active += 1;
        agent.last_assigned = tick;
        Ok(Some((entry.conversation_id, agent.id.clone())))
    }

    /// Park a conversation at the wait-list tail.
    pub async fn park(
        &self,
        queue_id: &str,
        conversation_id: &str,
    ) -> Result<usize, SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let queue = queue_mut(&mut inner, queue_id)?;
        queue.waiting.push_back(WaitEntry {
            conversation_id: conversation_id.to_string(),
            since: Instant::now(),
        });
        Ok(queue.waiting.len())
    }

    /// Put a conversation back at the wait-list head (persist-failure
    /// rollback path; it had been the head before).
    pub async fn park_front(
        &self,
        queue_id: &str,
        conversation_id: &str,
    ) -> Result<(), SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let queue = queue_mut(&mut inner, queue_id)?;
        queue.waiting.push_front(WaitEntry {
            conversation_id: conversation_id.to_string(),
            since: Instant::now(),
        });
        Ok(())
    }

    /// Drop a conversation from the wait-list, wherever it sits.
    pub async fn remove_waiting(
        &self,
        queue_id: &str,
        conversation_id: &str,
    ) -> Result<bool, SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let queue = queue_mut(&mut inner, queue_id)?;
        let before = queue.waiting.len();
        queue
            .waiting
            .retain(|entry| entry.conversation_id != conversation_id);
        Ok(queue.waiting.len() != before)
    }

    /// Re-count one persisted assignment during startup rebuild.
    ///
    /// Agents that have since left the config are re-added off-roster:
    /// the database says they hold a conversation, and the slot math has
    /// to reflect that until it is released.
    pub async fn restore_assignment(
        &self,
        queue_id: &str,
        agent_id: &str,
    ) -> Result<(), SwitchboardError> {
        let mut inner = self.inner.lock().await;
        let tick = next_tick(&mut inner);
        let queue = queue_mut(&mut inner, queue_id)?;
        queue.take_slot_for(agent_id, tick);
        Ok(())
    }

    /// Queues whose oldest waiting conversation has been parked longer
    /// than `threshold`.
    pub async fn starving(&self, threshold: Duration) -> Vec<StarvingQueue> {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner
            .queues
            .iter()
            .filter_map(|(id, queue)| {
                let oldest = queue.waiting.front()?;
                let age = now.duration_since(oldest.since);
                if age > threshold {
                    Some(StarvingQueue {
                        queue_id: id.clone(),
                        waiting: queue.waiting.len(),
                        oldest_wait: age,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Occupancy snapshot of every queue, sorted by queue id.
    pub async fn occupancy(&self) -> Vec<QueueOccupancy> {
        let inner = self.inner.lock().await;
        let mut queues: Vec<QueueOccupancy> = inner
            .queues
            .iter()
            .map(|(id, queue)| QueueOccupancy {
                queue_id: id.clone(),
                display_name: queue.display_name.clone(),
                max_slots: queue.max_slots,
                active: queue.total_active(),
                waiting: queue.waiting.len(),
                agents: queue
                    .agents
                    .iter()
                    .map(|a| AgentOccupancy {
                        agent_id: a.id.clone(),
                        active: a.active,
                    })
                    .collect(),
            })
            .collect();
        queues.sort_by(|a, b| a.queue_id.cmp(&b.queue_id));
        queues
    }

    /// Whether a queue id is known to the board.
    pub async fn has_queue(&self, queue_id: &str) -> bool {
        self.inner.lock().await.queues.contains_key(queue_id)
    }
}

fn next_tick(inner: &mut BoardInner) -> u64 {
    inner.tick += 1;
    inner.tick
}

fn queue_mut<'a>(
    inner: &'a mut BoardInner,
    queue_id: &str,
) -> Result<&'a mut QueueState, SwitchboardError> {
    inner
        .queues
        .get_mut(queue_id)
        .ok_or_else(|| SwitchboardError::NotFound {
            kind: "queue",
            id: queue_id.to_string(),
        })
}

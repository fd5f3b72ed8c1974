// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation state machine and its queue wiring.
//!
//! Every operation that mutates a conversation runs behind that
//! conversation's lock: fetch, decide, persist, publish. The queue board
//! takes slots before `WithAgent` is persisted and gets them back if the
//! persist fails, so board accounting and the store can only disagree
//! for the duration of one failed write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use switchboard_config::model::{EngineConfig, SwitchboardConfig};
use switchboard_core::{
    ChannelKind, Conversation, ConversationState, DeliveryStatus, EscalationPolicy,
    KeywordEscalation, Message, NewMessage, OutboundChannel, SenderKind, SwitchboardError,
};
use switchboard_hub::{ConversationEvent, PushHub};
use switchboard_metrics as metrics;
use switchboard_store::{now_rfc3339, SqliteStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::locks::ConversationLocks;
use crate::queue_board::{AssignOutcome, QueueBoard, QueueOccupancy};

/// What an ingested message did to its conversation.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The appended message, with its allocated seq.
    pub message: Message,
    /// Conversation state after any triggered transitions.
    pub state: ConversationState,
}

/// The realtime conversation engine.
pub struct ConversationEngine {
    store: Arc<SqliteStore>,
    hub: Arc<PushHub>,
    board: QueueBoard,
    locks: ConversationLocks,
    escalation: Box<dyn EscalationPolicy>,
    outbounds: DashMap<String, Arc<dyn OutboundChannel>>,
    config: EngineConfig,
}

impl ConversationEngine {
    /// Build an engine with the stock keyword escalation policy.
    pub fn new(store: Arc<SqliteStore>, hub: Arc<PushHub>, config: &SwitchboardConfig) -> Self {
        let escalation = Box::new(KeywordEscalation::new(&config.engine.escalation_keywords));
        Self::with_escalation(store, hub, config, escalation)
    }

    /// Build an engine with a custom escalation policy.
    pub fn with_escalation(
        store: Arc<SqliteStore>,
        hub: Arc<PushHub>,
        config: &SwitchboardConfig,
        escalation: Box<dyn EscalationPolicy>,
    ) -> Self {
        Self {
            store,
            hub,
            board: QueueBoard::new(&config.queues),
            locks: ConversationLocks::new(),
            escalation,
            outbounds: DashMap::new(),
            config: config.engine.clone(),
        }
    }

    /// Register the outbound adapter for a channel.
    ///
    /// Messages on channels without an adapter keep their `pending`
    /// delivery status.
    pub fn register_outbound(&self, channel: ChannelKind, adapter: Arc<dyn OutboundChannel>) {
        self.outbounds.insert(channel.to_string(), adapter);
    }

    /// Look up an existing conversation for a contact, or create one.
    ///
    /// Creation races on the unique `(channel, contact_address)` index
    /// resolve in favor of whoever inserted first.
    pub async fn ensure_conversation(
        &self,
        channel: ChannelKind,
        contact_address: &str,
        preferred_id: Option<&str>,
    ) -> Result<Conversation, SwitchboardError> {
        if let Some(existing) = self
            .store
            .find_by_contact(&channel.to_string(), contact_address)
            .await?
        {
            return Ok(existing);
        }

        let now = now_rfc3339();
        let conversation = Conversation {
            id: preferred_id
                .map(|s| s.to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            channel,
            contact_address: contact_address.to_string(),
            state: ConversationState::Bot,
            assigned_queue_id: None,
            next_seq: 1,
            last_activity_at: now.clone(),
            created_at: now,
        };
        match self.store.create_conversation(&conversation).await {
            Ok(()) => {
                info!(
                    conversation_id = %conversation.id,
                    channel = %conversation.channel,
                    "conversation created"
                );
                Ok(conversation)
            }
            Err(create_err) => {
                // Lost the creation race; take the winner's row.
                match self
                    .store
                    .find_by_contact(&channel.to_string(), contact_address)
                    .await?
                {
                    Some(existing) => Ok(existing),
                    None => Err(create_err),
                }
            }
        }
    }

    /// Append a message and run the state machine over it.
    pub async fn ingest_message(
        &self,
        conversation_id: &str,
        new_message: NewMessage,
    ) -> Result<IngestOutcome, SwitchboardError> {
        let _guard = self.locks.acquire(conversation_id).await;

        let mut conversation = self.fetch(conversation_id).await?;
        let sender_kind = new_message.sender_kind;
        let content = new_message.content.clone();

        let mut message = self.store.append_message(conversation_id, new_message).await?;
        metrics::record_message_appended(&sender_kind.to_string());
        conversation.next_seq = message.seq + 1;
        conversation.last_activity_at = message.created_at.clone();
        self.hub.publish(
            conversation_id,
            &ConversationEvent::new(message.clone(), conversation.state.clone()),
        );

        if sender_kind == SenderKind::Contact {
            match conversation.state.clone() {
                ConversationState::Closed => {
                    self.move_to_queue(&mut conversation, "conversation reopened")
                        .await?;
                }
                ConversationState::Bot if self.escalation.should_escalate(&content) => {
                    self.move_to_queue(&mut conversation, "contact requested a human")
                        .await?;
                }
                _ => {}
            }
        }

        if let Some(status) = self.deliver_outbound(&conversation, &message).await {
            message.delivery_status = Some(status);
        }

        Ok(IngestOutcome {
            message,
            state: conversation.state,
        })
    }

    /// Assign a waiting conversation to a named agent.
    ///
    /// `expected` is the caller's last observed state; any mismatch is a
    /// conflict, as is claiming a conversation that is not waiting.
    pub async fn claim(
        &self,
        conversation_id: &str,
        agent_id: &str,
        expected: &ConversationState,
    ) -> Result<Conversation, SwitchboardError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.fetch(conversation_id).await?;
        self.check_expected(&conversation, expected)?;
        if conversation.state != ConversationState::WaitingHuman {
            return Err(SwitchboardError::StateConflict {
                conversation_id: conversation_id.to_string(),
                expected: ConversationState::WaitingHuman,
                actual: conversation.state,
            });
        }
        let queue_id = self.require_queue(&conversation).await?;

        self.board.claim(&queue_id, conversation_id, agent_id).await?;
        if let Err(e) = self
            .apply_transition(
                &mut conversation,
                ConversationState::WithAgent(agent_id.to_string()),
                format!("claimed by agent {agent_id}"),
            )
            .await
        {
            if let Err(rollback) = self.board.release_slot(&queue_id, agent_id).await {
                warn!(queue_id, agent_id, error = %rollback, "claim slot rollback failed");
            }
            return Err(e);
        }
        metrics::record_assignment(&queue_id);
        info!(conversation_id, queue_id, agent_id, "conversation claimed");
        Ok(conversation)
    }

    /// Hand a conversation back from its agent to the queue.
    ///
    /// The freed slot first serves whoever was already waiting; the
    /// released conversation re-enters at the tail.
    pub async fn release(
        &self,
        conversation_id: &str,
        releasing_agent: &str,
    ) -> Result<Conversation, SwitchboardError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.fetch(conversation_id).await?;
        let expected = ConversationState::WithAgent(releasing_agent.to_string());
        self.check_expected(&conversation, &expected)?;
        let queue_id = self.require_queue(&conversation).await?;

        self.apply_transition(
            &mut conversation,
            ConversationState::WaitingHuman,
            format!("released by agent {releasing_agent}; back in queue"),
        )
        .await?;
        if let Err(e) = self.board.release_slot(&queue_id, releasing_agent).await {
            warn!(queue_id, agent_id = releasing_agent, error = %e, "slot release failed");
        }

        // Longest-waiting conversations get the freed slot before this
        // one re-enters the line.
        self.drain_queue(&queue_id).await;
        match self.board.request_assignment(&queue_id, conversation_id).await? {
            AssignOutcome::Assigned(agent_id) => {
                self.finish_assignment(&mut conversation, &queue_id, &agent_id)
                    .await?;
            }
            AssignOutcome::Parked { depth } => {
                info!(conversation_id, queue_id, depth, "released conversation re-parked");
                metrics::set_waiting_conversations(&queue_id, depth as f64);
            }
        }
        Ok(conversation)
    }

    /// Move a conversation directly between agents, bypassing the queue.
    pub async fn transfer(
        &self,
        conversation_id: &str,
        from_agent: &str,
        to_agent: &str,
    ) -> Result<Conversation, SwitchboardError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.fetch(conversation_id).await?;
        let expected = ConversationState::WithAgent(from_agent.to_string());
        self.check_expected(&conversation, &expected)?;
        let queue_id = self.require_queue(&conversation).await?;

        self.board.transfer(&queue_id, from_agent, to_agent).await?;
        if let Err(e) = self
            .apply_transition(
                &mut conversation,
                ConversationState::WithAgent(to_agent.to_string()),
                format!("transferred from agent {from_agent} to agent {to_agent}"),
            )
            .await
        {
            if let Err(rollback) = self.board.transfer(&queue_id, to_agent, from_agent).await {
                warn!(queue_id, error = %rollback, "transfer rollback failed");
            }
            return Err(e);
        }
        metrics::record_assignment(&queue_id);
        info!(conversation_id, queue_id, from_agent, to_agent, "conversation transferred");
        Ok(conversation)
    }

    /// Close a conversation from any open state.
    ///
    /// Slot release and wait-list removal happen inside the same
    /// critical section; a freed slot immediately serves the wait-list
    /// head. Closing an already-closed conversation with
    /// `expected = closed` is a no-op.
    pub async fn close(
        &self,
        conversation_id: &str,
        expected: &ConversationState,
        closed_by: &str,
    ) -> Result<Conversation, SwitchboardError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = self.fetch(conversation_id).await?;
        if conversation.state == ConversationState::Closed
            && *expected == ConversationState::Closed
        {
            return Ok(conversation);
        }
        self.check_expected(&conversation, expected)?;

        let freed_agent = conversation.assigned_agent().map(|a| a.to_string());
        let was_waiting = conversation.state == ConversationState::WaitingHuman;
        let queue_id = self.resolve_queue(&conversation);

        self.apply_transition(
            &mut conversation,
            ConversationState::Closed,
            format!("conversation closed by {closed_by}"),
        )
        .await?;

        if let Some(queue_id) = queue_id {
            if let Some(agent_id) = freed_agent {
                if let Err(e) = self.board.release_slot(&queue_id, &agent_id).await {
                    warn!(queue_id, agent_id, error = %e, "slot release on close failed");
                }
                self.drain_queue(&queue_id).await;
            } else if was_waiting {
                match self.board.remove_waiting(&queue_id, conversation_id).await {
                    Ok(false) => {
                        debug!(conversation_id, queue_id, "closed conversation was not parked")
                    }
                    Ok(true) => {}
                    Err(e) => warn!(queue_id, error = %e, "wait-list removal on close failed"),
                }
            }
        }
        info!(conversation_id, closed_by, "conversation closed");
        Ok(conversation)
    }

    /// Ordered replay of everything after `since_seq`.
    ///
    /// Idempotent; an empty delta is a successful empty list. Unknown
    /// conversations are an error, never an empty history.
    pub async fn catch_up(
        &self,
        conversation_id: &str,
        since_seq: i64,
    ) -> Result<Vec<Message>, SwitchboardError> {
        if self.store.get_conversation(conversation_id).await?.is_none() {
            return Err(SwitchboardError::NotFound {
                kind: "conversation",
                id: conversation_id.to_string(),
            });
        }
        self.store.get_messages_since(conversation_id, since_seq).await
    }

    /// Live occupancy of every queue.
    pub async fn queue_occupancy(&self) -> Vec<QueueOccupancy> {
        self.board.occupancy().await
    }

    /// Warn about queues whose head has waited past the configured
    /// threshold. Advisory only: nothing is closed or dropped.
    pub async fn starvation_sweep(&self) -> usize {
        let threshold = Duration::from_secs(self.config.starvation_warn_secs);
        let starving = self.board.starving(threshold).await;
        for queue in &starving {
            warn!(
                queue_id = %queue.queue_id,
                waiting = queue.waiting,
                oldest_wait_secs = queue.oldest_wait.as_secs(),
                "queue starvation: conversations waiting with no eligible agent"
            );
            metrics::record_starvation(&queue.queue_id);
        }
        for occupancy in self.board.occupancy().await {
            metrics::set_waiting_conversations(&occupancy.queue_id, occupancy.waiting as f64);
        }
        starving.len()
    }

    /// Close open conversations idle past `engine.idle_close_secs`.
    ///
    /// Waiting conversations are exempt: they belong to the queue until
    /// an agent takes them. A zero setting disables the sweep.
    pub async fn idle_sweep(&self) -> Result<usize, SwitchboardError> {
        if self.config.idle_close_secs == 0 {
            return Ok(0);
        }
        let cutoff = cutoff_before(self.config.idle_close_secs);
        let idle = self.store.list_idle_open(&cutoff).await?;
        let mut closed = 0;
        for conversation in idle {
            let expected = conversation.state.clone();
            match self.close(&conversation.id, &expected, "idle timeout").await {
                Ok(_) => closed += 1,
                Err(SwitchboardError::StateConflict { .. }) => {
                    debug!(
                        conversation_id = %conversation.id,
                        "conversation changed state before idle close"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        if closed > 0 {
            info!(closed, "idle sweep closed conversations");
        }
        Ok(closed)
    }

    /// Rebuild queue accounting from the store after a restart.
    ///
    /// Waiting conversations re-enter their queues oldest-first, active
    /// assignments re-count their slots, then every queue serves its
    /// head in case config changes freed capacity.
    pub async fn rebuild_board(&self) -> Result<(), SwitchboardError> {
        let mut parked = 0;
        for conversation in self.store.list_waiting().await? {
            let Some(queue_id) = self.resolve_queue(&conversation) else {
                warn!(
                    conversation_id = %conversation.id,
                    "waiting conversation has no queue; left unparked"
                );
                continue;
            };
            match self.board.park(&queue_id, &conversation.id).await {
                Ok(_) => parked += 1,
                Err(e) => warn!(
                    conversation_id = %conversation.id,
                    queue_id,
                    error = %e,
                    "could not re-park waiting conversation"
                ),
            }
        }

        let mut restored = 0;
        for conversation in self.store.list_assigned().await? {
            let queue_id = self.resolve_queue(&conversation);
            let agent_id = conversation.assigned_agent();
            let (Some(queue_id), Some(agent_id)) = (queue_id, agent_id) else {
                warn!(
                    conversation_id = %conversation.id,
                    "assigned conversation missing queue or agent; slot not counted"
                );
                continue;
            };
            match self.board.restore_assignment(&queue_id, agent_id).await {
                Ok(()) => restored += 1,
                Err(e) => warn!(
                    conversation_id = %conversation.id,
                    queue_id,
                    error = %e,
                    "could not restore assignment"
                ),
            }
        }

        info!(parked, restored, "queue board rebuilt from store");

        for occupancy in self.board.occupancy().await {
            self.drain_queue(&occupancy.queue_id).await;
        }
        Ok(())
    }

    // --- internals ---

    async fn fetch(&self, conversation_id: &str) -> Result<Conversation, SwitchboardError> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| SwitchboardError::NotFound {
                kind: "conversation",
                id: conversation_id.to_string(),
            })
    }

    fn check_expected(
        &self,
        conversation: &Conversation,
        expected: &ConversationState,
    ) -> Result<(), SwitchboardError> {
        if conversation.state != *expected {
            return Err(SwitchboardError::StateConflict {
                conversation_id: conversation.id.clone(),
                expected: expected.clone(),
                actual: conversation.state.clone(),
            });
        }
        Ok(())
    }

    fn resolve_queue(&self, conversation: &Conversation) -> Option<String> {
        conversation
            .assigned_queue_id
            .clone()
            .or_else(|| self.config.default_queue.clone())
    }

    async fn require_queue(&self, conversation: &Conversation) -> Result<String, SwitchboardError> {
        let queue_id = self
            .resolve_queue(conversation)
            .ok_or_else(|| SwitchboardError::NotFound {
                kind: "queue",
                id: "(unset)".to_string(),
            })?;
        if !self.board.has_queue(&queue_id).await {
            return Err(SwitchboardError::NotFound {
                kind: "queue",
                id: queue_id,
            });
        }
        Ok(queue_id)
    }

    /// Persist a transition with its audit message and push it out.
    async fn apply_transition(
        &self,
        conversation: &mut Conversation,
        new_state: ConversationState,
        audit: String,
    ) -> Result<(), SwitchboardError> {
        let audit_message = self
            .store
            .append_transition(&conversation.id, &new_state, NewMessage::system(audit))
            .await?;
        metrics::record_transition(&new_state.to_string());
        metrics::record_message_appended("system");
        conversation.state = new_state;
        conversation.next_seq = audit_message.seq + 1;
        conversation.last_activity_at = audit_message.created_at.clone();
        self.hub.publish(
            &conversation.id,
            &ConversationEvent::new(audit_message, conversation.state.clone()),
        );
        Ok(())
    }

    /// Escalate or reopen onto a queue, then try an immediate assignment.
    ///
    /// Without a resolvable queue an escalation stays with the bot and a
    /// reopen lands back in `Bot`; there is nothing to wait on.
    async fn move_to_queue(
        &self,
        conversation: &mut Conversation,
        reason: &str,
    ) -> Result<(), SwitchboardError> {
        let mut resolved = self.resolve_queue(conversation);
        if let Some(queue_id) = &resolved {
            if !self.board.has_queue(queue_id).await {
                warn!(
                    conversation_id = %conversation.id,
                    queue_id,
                    "conversation names an unknown queue; staying with bot"
                );
                resolved = None;
            }
        } else {
            debug!(conversation_id = %conversation.id, "no queue configured; staying with bot");
        }
        let Some(queue_id) = resolved else {
            if conversation.state == ConversationState::Closed {
                self.apply_transition(
                    conversation,
                    ConversationState::Bot,
                    "conversation reopened".to_string(),
                )
                .await?;
            }
            return Ok(());
        };

        if conversation.assigned_queue_id.as_deref() != Some(queue_id.as_str()) {
            self.store.set_queue(&conversation.id, Some(&queue_id)).await?;
            conversation.assigned_queue_id = Some(queue_id.clone());
        }

        self.apply_transition(
            conversation,
            ConversationState::WaitingHuman,
            format!("{reason}; queued on {queue_id}"),
        )
        .await?;

        match self.board.request_assignment(&queue_id, &conversation.id).await? {
            AssignOutcome::Assigned(agent_id) => {
                self.finish_assignment(conversation, &queue_id, &agent_id).await?;
            }
            AssignOutcome::Parked { depth } => {
                info!(
                    conversation_id = %conversation.id,
                    queue_id,
                    depth,
                    "conversation parked on wait-list"
                );
                metrics::set_waiting_conversations(&queue_id, depth as f64);
            }
        }
        Ok(())
    }

    /// Persist `WithAgent` for a slot the board already granted,
    /// rolling the slot back if the persist fails.
    async fn finish_assignment(
        &self,
        conversation: &mut Conversation,
        queue_id: &str,
        agent_id: &str,
    ) -> Result<(), SwitchboardError> {
        match self
            .apply_transition(
                conversation,
                ConversationState::WithAgent(agent_id.to_string()),
                format!("assigned to agent {agent_id}"),
            )
            .await
        {
            Ok(()) => {
                metrics::record_assignment(queue_id);
                info!(
                    conversation_id = %conversation.id,
                    queue_id,
                    agent_id,
                    "conversation assigned"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.board.release_slot(queue_id, agent_id).await {
                    warn!(queue_id, agent_id, error = %rollback, "assignment rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Serve the wait-list head while slots and waiting conversations
    /// both remain.
    async fn drain_queue(&self, queue_id: &str) {
        loop {
            let popped = match self.board.pop_assignable(queue_id).await {
                Ok(Some(pair)) => pair,
                Ok(None) => break,
                Err(e) => {
                    warn!(queue_id, error = %e, "wait-list drain aborted");
                    break;
                }
            };
            let (conversation_id, agent_id) = popped;
            if let Err(e) = self.assign_popped(queue_id, &conversation_id, &agent_id).await {
                warn!(
                    conversation_id = %conversation_id,
                    queue_id,
                    agent_id,
                    error = %e,
                    "failed to assign waiting conversation"
                );
                break;
            }
        }
    }

    async fn assign_popped(
        &self,
        queue_id: &str,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<(), SwitchboardError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut conversation = match self.store.get_conversation(conversation_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                // Row is gone; give the slot back and move on.
                self.board.release_slot(queue_id, agent_id).await?;
                return Ok(());
            }
            Err(e) => {
                if let Err(rollback) = self.board.release_slot(queue_id, agent_id).await {
                    warn!(queue_id, agent_id, error = %rollback, "slot rollback failed");
                }
                if let Err(rollback) = self.board.park_front(queue_id, conversation_id).await {
                    warn!(queue_id, error = %rollback, "re-park of wait-list head failed");
                }
                return Err(e);
            }
        };
        if conversation.state != ConversationState::WaitingHuman {
            // Left the waiting state through another path (e.g. closed).
            self.board.release_slot(queue_id, agent_id).await?;
            debug!(conversation_id, "popped conversation no longer waiting; slot returned");
            return Ok(());
        }
        self.finish_assignment(&mut conversation, queue_id, agent_id).await
    }

    /// Push an outbound-eligible message through the channel adapter and
    /// report the resulting status.
    ///
    /// Failures mark the message `failed` and are otherwise swallowed;
    /// delivery trouble never fails the append that caused it. Returns
    /// `None` when the message is not outbound-eligible or no adapter is
    /// registered (the row keeps its `pending` status).
    async fn deliver_outbound(
        &self,
        conversation: &Conversation,
        message: &Message,
    ) -> Option<DeliveryStatus> {
        if message.delivery_status != Some(DeliveryStatus::Pending) {
            return None;
        }
        let adapter = match self.outbounds.get(&conversation.channel.to_string()) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                debug!(
                    channel = %conversation.channel,
                    message_id = %message.id,
                    "no outbound adapter registered; delivery left pending"
                );
                return None;
            }
        };
        let status = match adapter
            .deliver(&conversation.contact_address, &message.content)
            .await
        {
            Ok(()) => DeliveryStatus::Sent,
            Err(e) => {
                warn!(
                    message_id = %message.id,
                    channel = adapter.name(),
                    error = %e,
                    "outbound delivery failed"
                );
                DeliveryStatus::Failed
            }
        };
        if let Err(e) = self.store.mark_delivery(&message.id, status).await {
            warn!(message_id = %message.id, error = %e, "failed to record delivery status");
        }
        Some(status)
    }
}

/// RFC3339 timestamp `secs` seconds in the past, in row format.
fn cutoff_before(secs: u64) -> String {
    (Utc::now() - chrono::Duration::seconds(secs as i64))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

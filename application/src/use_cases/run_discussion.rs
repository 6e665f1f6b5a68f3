//! Run Discussion use case
//!
//! Orchestrates a round-based discussion until consensus or deadlock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ports::agent_executor::{AgentExecutor, ExecutionError};
use crate::ports::progress::{DiscussionProgress, NoProgress};
use crate::resilience::{ErrorKind, FailedQuestion, FailedQuestionTracker};
use crate::router::{MessageRouter, SendOptions};
use concord_domain::protocol::Priority;
use concord_domain::util::current_timestamp_ms;
use concord_domain::{
    evaluate_round, extract_position, ConsensusResult, Contribution, DiscussionPrompt,
    DiscussionRoom, Participant, Position, RoomStatus, Round, ShorthandMessage,
};

const DEFAULT_MAX_ROUNDS: usize = 3;

/// Errors that can occur while running a discussion
#[derive(Error, Debug)]
pub enum DiscussionError {
    #[error("discussion room {0} not found")]
    RoomNotFound(Uuid),

    #[error("no enabled participants")]
    NoParticipants,

    #[error("discussion room {0} is already closed")]
    RoomClosed(Uuid),
}

/// Input for opening a discussion
#[derive(Debug, Clone)]
pub struct DiscussionInput {
    pub topic: String,
    pub participants: Vec<Participant>,
    pub moderator: String,
    pub max_rounds: usize,
}

impl DiscussionInput {
    pub fn new(topic: impl Into<String>, participants: Vec<Participant>) -> Self {
        Self {
            topic: topic.into(),
            participants,
            moderator: "orchestrator".to_string(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_moderator(mut self, moderator: impl Into<String>) -> Self {
        self.moderator = moderator.into();
        self
    }
}

/// Use case driving discussions: opens rooms, runs rounds, evaluates
/// consensus, and publishes lifecycle events on the router.
pub struct DiscussionEngine<E: AgentExecutor + 'static> {
    executor: Arc<E>,
    router: Arc<MessageRouter>,
    tracker: Arc<FailedQuestionTracker>,
    rooms: Mutex<HashMap<Uuid, DiscussionRoom>>,
}

impl<E: AgentExecutor + 'static> DiscussionEngine<E> {
    pub fn new(executor: Arc<E>, router: Arc<MessageRouter>) -> Self {
        Self {
            executor,
            router,
            tracker: Arc::new(FailedQuestionTracker::default()),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<FailedQuestionTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Prompts that permanently failed across all discussions.
    pub fn failed_questions(&self) -> Vec<FailedQuestion> {
        self.tracker.all()
    }

    /// Open a room and announce it. Participants are registered with the
    /// router so they see subsequent broadcasts.
    pub fn open_room(&self, input: DiscussionInput) -> Result<Uuid, DiscussionError> {
        if !input.participants.iter().any(|p| p.enabled) {
            return Err(DiscussionError::NoParticipants);
        }
        let room = DiscussionRoom::new(
            input.topic.clone(),
            input.participants,
            input.moderator.clone(),
            input.max_rounds,
        );
        let id = room.id;

        for participant in room.active_participants() {
            self.router.register_agent(&participant.id);
        }
        let announcement = ShorthandMessage {
            sender: input.moderator.clone(),
            recipient: "broadcast".to_string(),
            kind: "discuss_start".to_string(),
            data: slugify(&input.topic),
            params: Default::default(),
        };
        self.router.broadcast(
            &input.moderator,
            "discuss_start",
            serde_json::json!({ "room": id, "directive": announcement.format() }),
            SendOptions::with_priority(Priority::High),
        );

        info!(room = %id, topic = %room.topic, "discussion room opened");
        self.rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, room);
        Ok(id)
    }

    /// Snapshot of a room's current state.
    pub fn room(&self, id: Uuid) -> Option<DiscussionRoom> {
        self.rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Close a room early, optionally forcing a decision on it.
    pub fn close_room(
        &self,
        id: Uuid,
        decision: Option<String>,
    ) -> Result<(), DiscussionError> {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let room = rooms.get_mut(&id).ok_or(DiscussionError::RoomNotFound(id))?;
        if !room.is_active() {
            return Err(DiscussionError::RoomClosed(id));
        }
        room.close(RoomStatus::Closed, decision);
        Ok(())
    }

    /// Open a room and run it to completion with default (no-op) progress.
    pub async fn execute(&self, input: DiscussionInput) -> Result<ConsensusResult, DiscussionError> {
        let id = self.open_room(input)?;
        self.run_with_progress(id, &NoProgress).await
    }

    /// Run an open room to completion with progress callbacks.
    pub async fn run_with_progress(
        &self,
        room_id: Uuid,
        progress: &dyn DiscussionProgress,
    ) -> Result<ConsensusResult, DiscussionError> {
        let (topic, participants, moderator, max_rounds) = {
            let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            let room = rooms
                .get_mut(&room_id)
                .ok_or(DiscussionError::RoomNotFound(room_id))?;
            if !room.is_active() {
                return Err(DiscussionError::RoomClosed(room_id));
            }
            room.status = RoomStatus::Voting;
            (
                room.topic.clone(),
                room.participants.clone(),
                room.moderator.clone(),
                room.max_rounds,
            )
        };

        let active: Vec<Participant> = participants.into_iter().filter(|p| p.enabled).collect();
        if active.is_empty() {
            return Err(DiscussionError::NoParticipants);
        }

        let started_at = current_timestamp_ms();
        let mut rounds: Vec<Round> = Vec::new();
        let mut skipped: HashSet<String> = HashSet::new();
        let directive = round_directive(&moderator, &topic);

        for round_index in 0..max_rounds {
            info!(room = %room_id, round = round_index + 1, "round started");
            progress.on_round_start(round_index, active.len());

            let Some(proposer) = choose_proposer(&active, &skipped) else {
                warn!(room = %room_id, "all participants skipped, ending discussion");
                break;
            };

            let prompt =
                DiscussionPrompt::proposer(&topic, round_index, rounds.last(), &directive);
            let proposal = match self.ask(proposer, &prompt, round_index).await {
                Ok(contribution) => contribution,
                Err(kind) => {
                    // without a proposal there is nothing to vote on
                    warn!(room = %room_id, round = round_index + 1, agent = %proposer.id, "proposer failed, skipping round");
                    if kind == ErrorKind::Fatal {
                        skipped.insert(proposer.id.clone());
                    }
                    continue;
                }
            };
            progress.on_contribution(proposer, &proposal);
            self.publish_opinion(&moderator, room_id, &proposal);

            let mut contributions = vec![proposal];
            for participant in active.iter().filter(|p| p.id != proposer.id) {
                if skipped.contains(&participant.id) {
                    continue;
                }
                let prompt = DiscussionPrompt::responder(
                    &topic,
                    round_index,
                    &contributions[0],
                    &contributions[1..],
                    &participant.role,
                    &directive,
                );
                let contribution = match self.ask(participant, &prompt, round_index).await {
                    Ok(contribution) => contribution,
                    Err(ErrorKind::Fatal) => {
                        warn!(room = %room_id, agent = %participant.id, "fatal provider error, skipping agent");
                        skipped.insert(participant.id.clone());
                        continue;
                    }
                    Err(_) => placeholder_contribution(participant),
                };
                progress.on_contribution(participant, &contribution);
                self.publish_opinion(&moderator, room_id, &contribution);
                contributions.push(contribution);
            }

            let round = evaluate_round(round_index, contributions);
            info!(
                room = %room_id,
                round = round_index + 1,
                consensus = round.consensus_reached,
                tally = %round.tally(),
                "round evaluated"
            );
            progress.on_round_complete(&round);
            let reached = round.consensus_reached;
            rounds.push(round);
            if reached {
                break;
            }
        }

        let consensus_reached = rounds.last().is_some_and(|r| r.consensus_reached);
        let summary = self
            .summarize(&topic, &active, &skipped, rounds.last(), consensus_reached)
            .await;

        let (status, kind) = if consensus_reached {
            (RoomStatus::Consensus, "discuss_consensus")
        } else {
            (RoomStatus::Deadlock, "discuss_deadlock")
        };
        self.router.broadcast(
            &moderator,
            kind,
            serde_json::json!({ "room": room_id, "rounds": rounds.len() }),
            SendOptions::with_priority(Priority::High),
        );

        let duration_ms = current_timestamp_ms().saturating_sub(started_at);
        let result = ConsensusResult::from_rounds(
            topic,
            rounds,
            summary.clone(),
            active,
            duration_ms,
        );

        {
            let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(room) = rooms.get_mut(&room_id) {
                room.current_round = result.total_rounds();
                room.transcript = result
                    .rounds
                    .iter()
                    .flat_map(|r| r.contributions.iter().cloned())
                    .collect();
                room.close(status, Some(summary));
            }
        }
        info!(room = %room_id, consensus = consensus_reached, rounds = result.total_rounds(), "discussion finished");
        Ok(result)
    }

    /// Prompt one participant and build their contribution. Returns the
    /// error class when the executor gives up.
    async fn ask(
        &self,
        participant: &Participant,
        prompt: &str,
        round_index: usize,
    ) -> Result<Contribution, ErrorKind> {
        match self.executor.prompt(participant, prompt).await {
            Ok(reply) => {
                let (position, reason) = extract_position(&reply.content);
                debug!(agent = %participant.id, round = round_index + 1, %position, "contribution received");
                Ok(Contribution::new(
                    &participant.id,
                    &participant.name,
                    &participant.role,
                    reply.content,
                    position,
                )
                .with_reason(reason)
                .with_duration(reply.duration_ms)
                .with_source(&participant.model, &participant.provider))
            }
            Err(error) => {
                let kind = match &error {
                    ExecutionError::Fatal(_) => ErrorKind::Fatal,
                    ExecutionError::RateLimited(_) => ErrorKind::RateLimited,
                    ExecutionError::Retryable(_) => ErrorKind::Retryable,
                };
                self.tracker.record(FailedQuestion::new(
                    &participant.id,
                    &participant.role,
                    prompt,
                    kind,
                    error.to_string(),
                    crate::resilience::RateLimitConfig::MAX_RETRIES,
                ));
                Err(kind)
            }
        }
    }

    /// Ask the proposer (falling back to any active agent) for a closing
    /// summary; degrade to a generated one when nobody answers.
    async fn summarize(
        &self,
        topic: &str,
        active: &[Participant],
        skipped: &HashSet<String>,
        final_round: Option<&Round>,
        consensus_reached: bool,
    ) -> String {
        let Some(round) = final_round else {
            return format!("No rounds were completed for \"{topic}\".");
        };
        let prompt = DiscussionPrompt::summary(topic, round, consensus_reached);
        if let Some(summarizer) = choose_proposer(active, skipped) {
            if let Ok(reply) = self.executor.prompt(summarizer, &prompt).await {
                return reply.content;
            }
            warn!(agent = %summarizer.id, "summary generation failed, using fallback");
        }
        if consensus_reached {
            format!("Consensus reached on \"{topic}\" after {} round(s).", round.index + 1)
        } else {
            format!("No consensus on \"{topic}\" after {} round(s).", round.index + 1)
        }
    }

    fn publish_opinion(&self, moderator: &str, room_id: Uuid, contribution: &Contribution) {
        self.router.broadcast(
            moderator,
            "discuss_opinion",
            serde_json::json!({
                "room": room_id,
                "agent": contribution.agent_id,
                "position": contribution.position,
            }),
            SendOptions::default(),
        );
    }
}

/// The architect proposes when present, otherwise the first active agent.
fn choose_proposer<'a>(
    active: &'a [Participant],
    skipped: &HashSet<String>,
) -> Option<&'a Participant> {
    let available: Vec<&Participant> = active
        .iter()
        .filter(|p| !skipped.contains(&p.id))
        .collect();
    available
        .iter()
        .find(|p| p.role == "architect")
        .copied()
        .or_else(|| available.first().copied())
}

/// Placeholder recorded when an agent stays unreachable after retries.
/// It counts as a concern so a missing voice can never produce consensus.
fn placeholder_contribution(participant: &Participant) -> Contribution {
    Contribution::new(
        &participant.id,
        &participant.name,
        &participant.role,
        "[Agent unavailable after retries]",
        Position::Concern,
    )
    .with_reason(Some("Agent did not respond".to_string()))
}

fn round_directive(moderator: &str, topic: &str) -> String {
    let announcement = ShorthandMessage {
        sender: moderator.to_string(),
        recipient: "broadcast".to_string(),
        kind: "discuss_start".to_string(),
        data: slugify(topic),
        params: Default::default(),
    };
    announcement.format()
}

/// Reduce a topic to a short token usable in shorthand data.
fn slugify(topic: &str) -> String {
    let mut slug = String::new();
    for c in topic.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= 24 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "discussion".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_executor::AgentReply;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted executor: each agent answers from a queue of canned
    /// responses, repeating the last one when exhausted.
    struct ScriptedExecutor {
        scripts: HashMap<String, Vec<Result<String, ExecutionError>>>,
        calls: Mutex<HashMap<String, usize>>,
        prompts_seen: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(scripts: Vec<(&str, Vec<Result<String, ExecutionError>>)>) -> Self {
            Self {
                scripts: scripts
                    .into_iter()
                    .map(|(id, s)| (id.to_string(), s))
                    .collect(),
                calls: Mutex::new(HashMap::new()),
                prompts_seen: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AgentExecutor for ScriptedExecutor {
        async fn prompt(
            &self,
            participant: &Participant,
            _prompt: &str,
        ) -> Result<AgentReply, ExecutionError> {
            self.prompts_seen.fetch_add(1, Ordering::SeqCst);
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(participant.id.clone()).or_insert(0);
            let script = self
                .scripts
                .get(&participant.id)
                .unwrap_or_else(|| panic!("no script for {}", participant.id));
            let step = script.get(*n).or_else(|| script.last()).unwrap().clone();
            *n += 1;
            step.map(|content| AgentReply {
                content,
                duration_ms: 1,
                tokens_used: None,
            })
        }
    }

    fn team() -> Vec<Participant> {
        vec![
            Participant::new("arch", "Atlas", "architect").with_provider("mock"),
            Participant::new("sec", "Sentinel", "security").with_provider("mock"),
            Participant::new("test", "Probe", "tester").with_provider("mock"),
        ]
    }

    fn engine(executor: ScriptedExecutor) -> DiscussionEngine<ScriptedExecutor> {
        DiscussionEngine::new(Arc::new(executor), Arc::new(MessageRouter::new()))
    }

    #[tokio::test]
    async fn unanimous_support_reaches_consensus_in_one_round() {
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![
                Ok("We introduce feature flags.\n[POSITION: PROPOSAL] - flags".into()),
                Ok("Summary.\n- [ ] add a flag service (assigned: coder)".into()),
            ]),
            ("sec", vec![Ok("I agree, support.\n[POSITION: SUPPORT] - safe".into())]),
            ("test", vec![Ok("[POSITION: SUPPORT] - testable".into())]),
        ]);
        let engine = engine(executor);
        let result = engine
            .execute(DiscussionInput::new("Feature flags", team()))
            .await
            .unwrap();

        assert!(result.consensus_reached);
        assert_eq!(result.total_rounds(), 1);
        assert_eq!(result.rounds[0].contributions[0].position, Position::Proposal);
        assert_eq!(result.action_items.len(), 1);
        assert_eq!(result.action_items[0].assignee.as_deref(), Some("coder"));
    }

    #[tokio::test]
    async fn objection_triggers_revision_round() {
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![
                Ok("Plan v1.\n[POSITION: PROPOSAL] - v1".into()),
                Ok("Plan v2 with audit log.\n[POSITION: PROPOSAL] - v2".into()),
                Ok("Summary.".into()),
            ]),
            ("sec", vec![
                Ok("[POSITION: OBJECTION] - no audit trail".into()),
                Ok("[POSITION: SUPPORT] - audit added".into()),
            ]),
            ("test", vec![Ok("[POSITION: SUPPORT] - fine".into())]),
        ]);
        let engine = engine(executor);
        let result = engine
            .execute(DiscussionInput::new("Logging", team()))
            .await
            .unwrap();

        assert!(result.consensus_reached);
        assert_eq!(result.total_rounds(), 2);
        assert!(!result.rounds[0].consensus_reached);
        assert_eq!(result.rounds[0].objections, vec!["Sentinel: no audit trail"]);
    }

    #[tokio::test]
    async fn deadlock_after_max_rounds() {
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![Ok("Plan.\n[POSITION: PROPOSAL] - plan".into())]),
            ("sec", vec![Ok("[POSITION: OBJECTION] - never".into())]),
            ("test", vec![Ok("[POSITION: SUPPORT] - ok".into())]),
        ]);
        let engine = engine(executor);
        let input = DiscussionInput::new("Stubborn", team()).with_max_rounds(2);
        let id = engine.open_room(input).unwrap();
        let result = engine.run_with_progress(id, &NoProgress).await.unwrap();

        assert!(!result.consensus_reached);
        assert_eq!(result.total_rounds(), 2);
        let room = engine.room(id).unwrap();
        assert_eq!(room.status, RoomStatus::Deadlock);
    }

    #[tokio::test]
    async fn unreachable_responder_becomes_concern_placeholder() {
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![Ok("Plan.\n[POSITION: PROPOSAL] - plan".into())]),
            ("sec", vec![Err(ExecutionError::Retryable("timeout".into()))]),
            ("test", vec![Ok("[POSITION: SUPPORT] - ok".into())]),
        ]);
        let engine = engine(executor);
        let input = DiscussionInput::new("Outage", team()).with_max_rounds(1);
        let result = engine.execute(input).await.unwrap();

        assert!(!result.consensus_reached);
        let round = &result.rounds[0];
        let placeholder = round
            .contributions
            .iter()
            .find(|c| c.agent_id == "sec")
            .unwrap();
        assert_eq!(placeholder.position, Position::Concern);
        assert_eq!(engine.failed_questions().len(), 1);
    }

    #[tokio::test]
    async fn fatal_error_skips_agent_for_remaining_rounds() {
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![Ok("Plan.\n[POSITION: PROPOSAL] - plan".into())]),
            ("sec", vec![Err(ExecutionError::Fatal("invalid api key".into()))]),
            ("test", vec![Ok("[POSITION: OBJECTION] - nope".into())]),
        ]);
        let engine = engine(executor);
        let input = DiscussionInput::new("Keys", team()).with_max_rounds(2);
        let result = engine.execute(input).await.unwrap();

        // sec appears in no round after its fatal failure
        for round in &result.rounds {
            assert!(round.contributions.iter().all(|c| c.agent_id != "sec"));
        }
        assert_eq!(engine.failed_questions().len(), 1);
    }

    #[tokio::test]
    async fn proposer_failure_skips_the_round() {
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![
                Err(ExecutionError::Retryable("timeout".into())),
                Ok("Plan.\n[POSITION: PROPOSAL] - plan".into()),
            ]),
            ("sec", vec![Ok("[POSITION: SUPPORT] - ok".into())]),
            ("test", vec![Ok("[POSITION: SUPPORT] - ok".into())]),
        ]);
        let engine = engine(executor);
        let input = DiscussionInput::new("Retry", team()).with_max_rounds(3);
        let result = engine.execute(input).await.unwrap();

        // round one was skipped entirely, consensus lands in the next
        assert!(result.consensus_reached);
        assert_eq!(result.total_rounds(), 1);
    }

    #[tokio::test]
    async fn open_room_requires_enabled_participants() {
        let engine = engine(ScriptedExecutor::new(vec![]));
        let input = DiscussionInput::new(
            "Empty",
            vec![Participant::new("a", "A", "tester").disabled()],
        );
        assert!(matches!(
            engine.open_room(input),
            Err(DiscussionError::NoParticipants)
        ));
    }

    #[tokio::test]
    async fn close_room_records_forced_decision() {
        let engine = engine(ScriptedExecutor::new(vec![]));
        let id = engine
            .open_room(DiscussionInput::new("Forced close", team()))
            .unwrap();

        engine
            .close_room(id, Some("Ship the current draft".into()))
            .unwrap();

        let room = engine.room(id).unwrap();
        assert_eq!(room.status, RoomStatus::Closed);
        assert_eq!(room.decision.as_deref(), Some("Ship the current draft"));
        assert!(matches!(
            engine.close_room(id, None),
            Err(DiscussionError::RoomClosed(_))
        ));
    }

    #[tokio::test]
    async fn unknown_room_errors() {
        let engine = engine(ScriptedExecutor::new(vec![]));
        let result = engine.run_with_progress(Uuid::new_v4(), &NoProgress).await;
        assert!(matches!(result, Err(DiscussionError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn lifecycle_events_are_broadcast() {
        let router = Arc::new(MessageRouter::new());
        router.register_agent("observer");
        let executor = ScriptedExecutor::new(vec![
            ("arch", vec![
                Ok("Plan.\n[POSITION: PROPOSAL] - plan".into()),
                Ok("Summary.".into()),
            ]),
            ("sec", vec![Ok("[POSITION: SUPPORT] - ok".into())]),
            ("test", vec![Ok("[POSITION: SUPPORT] - ok".into())]),
        ]);
        let engine = DiscussionEngine::new(Arc::new(executor), Arc::clone(&router));
        engine
            .execute(DiscussionInput::new("Events", team()))
            .await
            .unwrap();

        let kinds: Vec<String> = router
            .receive("observer", crate::router::ReceiveOptions::default())
            .into_iter()
            .map(|m| m.kind)
            .collect();
        // high-priority lifecycle events dequeue before normal opinions
        assert_eq!(kinds.first().map(String::as_str), Some("discuss_start"));
        assert_eq!(kinds.get(1).map(String::as_str), Some("discuss_consensus"));
        assert!(kinds.iter().any(|k| k == "discuss_opinion"));
    }
}

//! Voting engine
//!
//! Decides, for one inbound event against a freshly loaded dataset, what
//! replies to send and whether the dataset changed. The engine holds no
//! state of its own beyond the immutable configuration; callers load the
//! dataset before each decision and persist it after a mutation.

pub mod report;
pub mod state;

use crate::config::{Config, Group};
use crate::store::VotingDataset;
use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info};

use state::VoterState;

const CMD_VOTE: &str = "vote";
const CMD_TALLY: &str = "tally";
const CMD_RESET: &str = "reset";

pub const MSG_NOT_OPEN: &str = "Voting hasn't opened yet. Please come back once the event starts!";
pub const MSG_CLOSED: &str = "Voting is closed. Thank you for taking part!";
pub const MSG_COMPLETED_TODAY: &str = "You've already voted today. Come back tomorrow!";
pub const MSG_GROUP_A_INTRO: &str = "Today's vote is open! First, pick your group A candidate.";
pub const MSG_GROUP_B_PROMPT: &str = "Now pick your group B candidate.";
pub const MSG_RESET_DONE: &str = "Daily vote lock cleared. Send \"vote\" to run the flow again.";
pub const MSG_NOTHING_TO_RESET: &str = "Nothing to reset.";
pub const MSG_ADMIN_MARKER: &str =
    "[admin test mode] This is a rehearsal; no votes will be recorded.";

/// An inbound event kind, already reduced to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Free-text message.
    Text(String),
    /// Postback payload from a tapped carousel card.
    Postback(String),
}

/// A platform-neutral reply message. The gateway layer renders these
/// into LINE message objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image { url: String },
    /// Carousel of all candidates in a group, one tappable card each.
    Carousel(Group),
}

/// The outcome of handling one event: replies to send, and whether the
/// dataset was mutated and must be persisted.
#[derive(Debug, Clone, Default)]
pub struct Decision {
    pub replies: Vec<Reply>,
    pub persist: bool,
}

impl Decision {
    /// No reply, no mutation.
    fn ignore() -> Self {
        Self::default()
    }

    fn reply(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            persist: false,
        }
    }

    fn mutate(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            persist: true,
        }
    }
}

/// Build the postback payload embedded in a carousel card.
pub fn vote_payload(candidate_id: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("action", "vote")
        .append_pair("candidateId", candidate_id)
        .finish()
}

/// Parse a postback payload; `Some(candidate_id)` only for a well-formed
/// vote action.
pub fn parse_vote_payload(data: &str) -> Option<String> {
    let mut is_vote = false;
    let mut candidate_id = None;
    for (key, value) in url::form_urlencoded::parse(data.as_bytes()) {
        match key.as_ref() {
            "action" => is_vote = value == "vote",
            "candidateId" => candidate_id = Some(value.into_owned()),
            _ => {}
        }
    }
    if is_vote {
        candidate_id
    } else {
        None
    }
}

/// The voting rules, bound to an immutable configuration.
#[derive(Debug, Clone)]
pub struct VotingEngine {
    config: Arc<Config>,
}

impl VotingEngine {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Handle one event. Commands other than "vote"/"tally"/"reset" and
    /// unrecognized postbacks are silently ignored by design.
    pub fn handle_event(
        &self,
        user_id: &str,
        event: &EventKind,
        dataset: &mut VotingDataset,
        now: DateTime<Tz>,
    ) -> Decision {
        match event {
            EventKind::Text(text) => self.handle_text(user_id, text.trim(), dataset, now),
            EventKind::Postback(data) => self.handle_postback(user_id, data, dataset, now),
        }
    }

    fn handle_text(
        &self,
        user_id: &str,
        text: &str,
        dataset: &mut VotingDataset,
        now: DateTime<Tz>,
    ) -> Decision {
        let admin = self.config.is_admin(user_id);
        match text {
            CMD_VOTE => {
                if !admin {
                    if let Some(gate) = self.window_gate(now) {
                        return Decision::reply(vec![Reply::Text(gate)]);
                    }
                }
                self.vote_command(user_id, dataset, now, admin)
            }
            CMD_TALLY if admin => {
                info!(user_id, "admin tally report");
                Decision::reply(vec![Reply::Text(report::render(&self.config, dataset))])
            }
            CMD_RESET if admin => self.reset_command(user_id, dataset),
            _ => {
                debug!(user_id, text, "ignoring unrecognized command");
                Decision::ignore()
            }
        }
    }

    /// The voting window check for general users. `None` means proceed.
    fn window_gate(&self, now: DateTime<Tz>) -> Option<String> {
        let local = now.naive_local();
        if local < self.config.window.opens_at {
            Some(MSG_NOT_OPEN.to_string())
        } else if local > self.config.window.closes_at {
            Some(MSG_CLOSED.to_string())
        } else {
            None
        }
    }

    fn vote_command(
        &self,
        user_id: &str,
        dataset: &mut VotingDataset,
        now: DateTime<Tz>,
        admin: bool,
    ) -> Decision {
        let today = now.date_naive();
        let mut decision = match VoterState::derive(dataset.record(user_id), today) {
            VoterState::CompletedToday => {
                Decision::reply(vec![Reply::Text(MSG_COMPLETED_TODAY.to_string())])
            }
            VoterState::AwaitingGroupB => Decision::reply(group_b_prompt()),
            VoterState::NewDay => {
                let replies = vec![
                    Reply::Text(MSG_GROUP_A_INTRO.to_string()),
                    Reply::Carousel(Group::A),
                ];
                if admin {
                    Decision::reply(replies)
                } else {
                    dataset.reset_record(user_id);
                    Decision::mutate(replies)
                }
            }
        };
        if admin {
            mark_admin(&mut decision);
        }
        decision
    }

    fn handle_postback(
        &self,
        user_id: &str,
        data: &str,
        dataset: &mut VotingDataset,
        now: DateTime<Tz>,
    ) -> Decision {
        let Some(candidate_id) = parse_vote_payload(data) else {
            debug!(user_id, data, "ignoring unrecognized postback payload");
            return Decision::ignore();
        };

        let admin = self.config.is_admin(user_id);
        if !admin {
            if let Some(gate) = self.window_gate(now) {
                return Decision::reply(vec![Reply::Text(gate)]);
            }
        }

        let Some(candidate) = self.config.candidate(&candidate_id) else {
            debug!(user_id, %candidate_id, "ignoring postback for unknown candidate");
            return Decision::ignore();
        };

        let today = now.date_naive();
        let (group_a_vote, slot_taken) = match dataset.record(user_id) {
            Some(record) => (
                record.group_a.clone(),
                record.vote_for(candidate.group).is_some(),
            ),
            None => (None, false),
        };

        let mut decision = if slot_taken {
            // Duplicate submission (double tap or replayed postback).
            Decision::reply(vec![Reply::Text(already_voted(candidate.group))])
        } else if candidate.group == Group::B && group_a_vote.is_none() {
            // A group-B card tapped before any group-A vote exists; a
            // record with B but not A must never be written.
            debug!(user_id, %candidate_id, "ignoring group B postback before group A vote");
            return Decision::ignore();
        } else {
            let mut replies = Vec::new();
            let mut persist = false;
            match candidate.group {
                Group::A => {
                    if !admin {
                        dataset.increment(&candidate.id);
                        dataset.record_mut(user_id).group_a = Some(candidate.id.clone());
                        persist = true;
                        info!(user_id, candidate_id = %candidate.id, "group A vote recorded");
                    }
                    replies.push(Reply::Text(confirm_group_a(&candidate.name)));
                    replies.extend(group_b_prompt());
                }
                Group::B => {
                    if !admin {
                        dataset.increment(&candidate.id);
                        let record = dataset.record_mut(user_id);
                        record.group_b = Some(candidate.id.clone());
                        record.last_completed = Some(today);
                        persist = true;
                        info!(user_id, candidate_id = %candidate.id, "group B vote recorded; cycle complete");
                    }
                    let group_a_name = group_a_vote
                        .as_deref()
                        .map(|id| {
                            self.config
                                .candidate(id)
                                .map(|c| c.name.as_str())
                                .unwrap_or(id)
                        })
                        .unwrap_or_default();
                    replies.push(Reply::Text(completion_summary(
                        group_a_name,
                        &candidate.name,
                    )));
                    if let Some(url) = &self.config.completion_image_url {
                        replies.push(Reply::Image { url: url.clone() });
                    }
                }
            }
            Decision { replies, persist }
        };

        if admin {
            mark_admin(&mut decision);
        }
        decision
    }

    /// Admin-only: clear the caller's daily lock, leaving group picks
    /// intact so a half-finished cycle resumes rather than restarts.
    fn reset_command(&self, user_id: &str, dataset: &mut VotingDataset) -> Decision {
        match dataset.voters.get_mut(user_id) {
            Some(record) if record.last_completed.is_some() => {
                record.last_completed = None;
                info!(user_id, "daily vote lock cleared");
                Decision::mutate(vec![Reply::Text(MSG_RESET_DONE.to_string())])
            }
            _ => Decision::reply(vec![Reply::Text(MSG_NOTHING_TO_RESET.to_string())]),
        }
    }
}

/// Prefix the replies with the test-mode marker and drop any mutation.
fn mark_admin(decision: &mut Decision) {
    decision.persist = false;
    if !decision.replies.is_empty() {
        decision
            .replies
            .insert(0, Reply::Text(MSG_ADMIN_MARKER.to_string()));
    }
}

fn group_b_prompt() -> Vec<Reply> {
    vec![
        Reply::Text(MSG_GROUP_B_PROMPT.to_string()),
        Reply::Carousel(Group::B),
    ]
}

fn confirm_group_a(name: &str) -> String {
    format!("Got it: {name} has your group A vote.")
}

fn completion_summary(group_a_name: &str, group_b_name: &str) -> String {
    format!(
        "Your votes are in: {group_a_name} (group A) and {group_b_name} (group B). See you tomorrow!"
    )
}

fn already_voted(group: Group) -> String {
    format!("You've already voted for a group {group} candidate in this cycle.")
}

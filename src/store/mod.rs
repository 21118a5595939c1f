//! Vote dataset persistence
//!
//! The whole dataset is one JSON file, loaded fresh before each decision
//! and rewritten wholesale after a mutation. Last successful write wins;
//! there is no partial update.

use crate::config::{Candidate, Group};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Errors raised by dataset IO.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-user voting progress for the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    /// Candidate id chosen from group A, once picked this cycle.
    #[serde(rename = "A", default, skip_serializing_if = "Option::is_none")]
    pub group_a: Option<String>,
    /// Candidate id chosen from group B, once picked this cycle.
    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    pub group_b: Option<String>,
    /// Date the user last completed both picks.
    #[serde(
        rename = "lastCompletedDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_completed: Option<NaiveDate>,
}

impl VoterRecord {
    /// The candidate id recorded for a group, if any.
    pub fn vote_for(&self, group: Group) -> Option<&str> {
        match group {
            Group::A => self.group_a.as_deref(),
            Group::B => self.group_b.as_deref(),
        }
    }
}

/// The aggregate root: per-candidate tallies plus per-user progress.
/// Loaded and saved as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingDataset {
    /// Candidate id to vote count. Holds exactly the configured roster.
    pub votes: BTreeMap<String, u64>,
    /// User id to voting progress.
    pub voters: BTreeMap<String, VoterRecord>,
}

impl VotingDataset {
    /// Fresh dataset: zero counts for every roster candidate, no voters.
    pub fn initial(roster: &[Candidate]) -> Self {
        Self {
            votes: roster.iter().map(|c| (c.id.clone(), 0)).collect(),
            voters: BTreeMap::new(),
        }
    }

    /// Force the tally to cover exactly the roster: missing ids start at
    /// zero, ids no longer configured are dropped.
    pub fn normalize(&mut self, roster: &[Candidate]) {
        let known: std::collections::HashSet<&str> =
            roster.iter().map(|c| c.id.as_str()).collect();
        let before = self.votes.len();
        self.votes.retain(|id, _| known.contains(id.as_str()));
        if self.votes.len() < before {
            warn!(
                dropped = before - self.votes.len(),
                "dropped tally entries for candidates not in the roster"
            );
        }
        for candidate in roster {
            self.votes.entry(candidate.id.clone()).or_insert(0);
        }
    }

    /// Current count for a candidate id.
    pub fn count(&self, candidate_id: &str) -> u64 {
        self.votes.get(candidate_id).copied().unwrap_or(0)
    }

    /// Add one vote for a candidate id.
    pub fn increment(&mut self, candidate_id: &str) {
        *self.votes.entry(candidate_id.to_string()).or_insert(0) += 1;
    }

    /// The user's record, if one exists.
    pub fn record(&self, user_id: &str) -> Option<&VoterRecord> {
        self.voters.get(user_id)
    }

    /// The user's record, created empty on first access.
    pub fn record_mut(&mut self, user_id: &str) -> &mut VoterRecord {
        self.voters.entry(user_id.to_string()).or_default()
    }

    /// Replace the user's record with an empty one.
    pub fn reset_record(&mut self, user_id: &str) {
        self.voters
            .insert(user_id.to_string(), VoterRecord::default());
    }

    /// Number of users with a record, regardless of progress.
    pub fn distinct_voters(&self) -> usize {
        self.voters.len()
    }
}

/// Whole-file JSON store for the voting dataset.
#[derive(Debug, Clone)]
pub struct VoteStore {
    path: PathBuf,
}

impl VoteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the dataset, reinitializing on a missing or unreadable file.
    /// Data loss on a corrupt file is accepted, not recovered.
    pub async fn load(&self, roster: &[Candidate]) -> Result<VotingDataset, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<VotingDataset>(&bytes) {
                Ok(mut dataset) => {
                    dataset.normalize(roster);
                    Ok(dataset)
                }
                Err(error) => {
                    warn!(
                        path = %self.path.display(),
                        %error,
                        "vote dataset unreadable; reinitializing"
                    );
                    self.initialize(roster).await
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no vote dataset; initializing");
                self.initialize(roster).await
            }
            Err(error) => Err(StoreError::Io(error)),
        }
    }

    /// Persist the whole dataset. Writes to a temp file then renames so a
    /// crash mid-write cannot leave a truncated dataset behind.
    pub async fn save(&self, dataset: &VotingDataset) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(dataset)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn initialize(&self, roster: &[Candidate]) -> Result<VotingDataset, StoreError> {
        let dataset = VotingDataset::initial(roster);
        self.save(&dataset).await?;
        Ok(dataset)
    }
}

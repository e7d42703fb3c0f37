use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub player_id: Uuid,
    pub username: String,
    pub score: i64,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub username: String,
    pub score: i64,
    pub rank: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Highest score first; earlier joiners break ties. Equal scores share a
    /// rank and the next distinct score skips ahead (1, 1, 3).
    pub fn rank(standings: impl IntoIterator<Item = Standing>) -> Self {
        let sorted = standings
            .into_iter()
            .sorted_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(a.joined_at.cmp(&b.joined_at))
                    .then_with(|| a.username.cmp(&b.username))
            })
            .collect_vec();

        let mut entries = Vec::with_capacity(sorted.len());
        let mut rank = 0;
        let mut previous_score = None;
        for (position, standing) in sorted.into_iter().enumerate() {
            if previous_score != Some(standing.score) {
                rank = position + 1;
                previous_score = Some(standing.score);
            }
            entries.push(LeaderboardEntry {
                id: standing.player_id,
                username: standing.username,
                score: standing.score,
                rank,
            });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LeaderboardEntry> {
        self.entries
    }

    pub fn top(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    pub fn position_of(&self, player_id: Uuid) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.id == player_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn standing(name: &str, score: i64, joined_offset_secs: i64) -> Standing {
        Standing {
            player_id: Uuid::new_v4(),
            username: name.to_string(),
            score,
            joined_at: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(joined_offset_secs),
        }
    }

    #[test]
    fn sorts_by_score_descending() {
        let board = Leaderboard::rank(vec![
            standing("alice", 100, 0),
            standing("bob", 250, 1),
            standing("carol", 0, 2),
        ]);
        let names = board.entries().iter().map(|e| e.username.as_str()).collect_vec();
        assert_eq!(names, vec!["bob", "alice", "carol"]);
        assert_eq!(board.top().map(|e| e.score), Some(250));
    }

    #[test]
    fn ties_share_rank_and_earlier_joiner_leads() {
        let board = Leaderboard::rank(vec![
            standing("late", 150, 10),
            standing("early", 150, 1),
            standing("last", 100, 0),
        ]);
        let ranks = board
            .entries()
            .iter()
            .map(|e| (e.username.as_str(), e.rank))
            .collect_vec();
        assert_eq!(ranks, vec![("early", 1), ("late", 1), ("last", 3)]);
    }

    #[test]
    fn empty_board_has_no_top() {
        let board = Leaderboard::rank(Vec::new());
        assert!(board.is_empty());
        assert!(board.top().is_none());
    }

    #[test]
    fn finds_player_position() {
        let alice = standing("alice", 10, 0);
        let alice_id = alice.player_id;
        let board = Leaderboard::rank(vec![standing("bob", 20, 0), alice]);
        assert_eq!(board.position_of(alice_id).map(|e| e.rank), Some(2));
    }
}

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use game_types::{GameType, PlayerId};

#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub player_id: PlayerId,
    pub skill_tier: u8,
    pub queued_at: Instant,
}

#[derive(Debug, Clone)]
pub struct MatchInfo {
    pub game_type: GameType,
    pub players: Vec<PlayerId>,
    pub created_at: Instant,
}

/// How far apart in skill two queued players may be, as a function of
/// how long the anchor has waited. Implementations must be monotonic:
/// waiting longer never shrinks the accepted gap.
pub trait WidenStrategy: Send + Sync {
    fn allowed_gap(&self, waited: Duration) -> u8;
}

/// Widens the accepted tier gap by one every `step`, capped at `max_gap`.
/// Fresh players only match their own tier.
pub struct StepWiden {
    pub step: Duration,
    pub max_gap: u8,
}

impl WidenStrategy for StepWiden {
    fn allowed_gap(&self, waited: Duration) -> u8 {
        let steps = waited.as_millis() / self.step.as_millis().max(1);
        steps.min(self.max_gap as u128) as u8
    }
}

/// Per-game-type matchmaking queues. Players wait with a skill tier;
/// matches pair players whose tiers fall within both parties' widened
/// acceptance windows, oldest waiter first.
pub struct MatchmakingQueue {
    queues: RwLock<HashMap<GameType, VecDeque<QueuedPlayer>>>,
    queued_players: RwLock<HashMap<PlayerId, GameType>>,
    min_players: usize,
    max_players: usize,
    queue_timeout: Duration,
    widen: Box<dyn WidenStrategy>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::with_queue_timeout(Duration::from_secs(60))
    }

    /// Default match policy with a configured wait timeout.
    pub fn with_queue_timeout(queue_timeout: Duration) -> Self {
        Self::new_with_config(
            2,
            4,
            queue_timeout,
            Box::new(StepWiden {
                step: Duration::from_secs(10),
                max_gap: 3,
            }),
        )
    }

    pub fn new_with_config(
        min_players: usize,
        max_players: usize,
        queue_timeout: Duration,
        widen: Box<dyn WidenStrategy>,
    ) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            queued_players: RwLock::new(HashMap::new()),
            min_players,
            max_players,
            queue_timeout,
            widen,
        }
    }

    /// Queues a player. Re-queueing replaces the prior entry, including
    /// its wait time, so switching game type or tier is one call.
    pub async fn add_player(
        &self,
        player_id: PlayerId,
        game_type: GameType,
        skill_tier: u8,
    ) -> Result<u32, String> {
        let mut queues = self.queues.write().await;
        let mut queued_players = self.queued_players.write().await;

        if let Some(previous) = queued_players.remove(&player_id) {
            if let Some(queue) = queues.get_mut(&previous) {
                queue.retain(|p| p.player_id != player_id);
            }
        }

        let queue = queues.entry(game_type).or_default();
        queue.push_back(QueuedPlayer {
            player_id,
            skill_tier,
            queued_at: Instant::now(),
        });
        queued_players.insert(player_id, game_type);

        let position = queue.len() as u32;
        info!(
            "Player {} queued for {} (tier {}) at position {}",
            player_id,
            game_type.as_str(),
            skill_tier,
            position
        );
        Ok(position)
    }

    pub async fn remove_player(&self, player_id: PlayerId) -> Result<(), String> {
        let mut queues = self.queues.write().await;
        let mut queued_players = self.queued_players.write().await;

        let Some(game_type) = queued_players.remove(&player_id) else {
            return Err("Player not in queue".to_string());
        };

        if let Some(queue) = queues.get_mut(&game_type) {
            if let Some(index) = queue.iter().position(|p| p.player_id == player_id) {
                queue.remove(index);
                info!("Player {} removed from queue", player_id);
                return Ok(());
            }
        }

        warn!("Player {} indexed but missing from its queue", player_id);
        Err("Player not found in queue".to_string())
    }

    /// Forms every match currently possible. For each game type the
    /// longest waiter anchors a group; others join if the tier gap fits
    /// inside both their own and the anchor's widened windows.
    pub async fn try_create_matches(&self) -> Vec<MatchInfo> {
        let mut queues = self.queues.write().await;
        let mut queued_players = self.queued_players.write().await;
        let now = Instant::now();
        let mut matches = Vec::new();

        for (&game_type, queue) in queues.iter_mut() {
            loop {
                let Some(formed) = form_match(
                    queue,
                    now,
                    self.min_players,
                    self.max_players,
                    self.widen.as_ref(),
                ) else {
                    break;
                };
                for player_id in &formed {
                    queued_players.remove(player_id);
                }
                info!(
                    "Matched {} players for {}",
                    formed.len(),
                    game_type.as_str()
                );
                matches.push(MatchInfo {
                    game_type,
                    players: formed,
                    created_at: now,
                });
            }
        }

        matches
    }

    /// Drops players who have waited past the timeout and returns them so
    /// the caller can notify each one.
    pub async fn cleanup_expired_players(&self) -> Vec<PlayerId> {
        let mut queues = self.queues.write().await;
        let mut queued_players = self.queued_players.write().await;
        let now = Instant::now();
        let mut expired = Vec::new();

        for queue in queues.values_mut() {
            queue.retain(|player| {
                if now.duration_since(player.queued_at) > self.queue_timeout {
                    warn!("Player {} timed out of matchmaking", player.player_id);
                    expired.push(player.player_id);
                    false
                } else {
                    true
                }
            });
        }
        for player_id in &expired {
            queued_players.remove(player_id);
        }

        expired
    }

    pub async fn is_player_in_queue(&self, player_id: PlayerId) -> bool {
        let queued_players = self.queued_players.read().await;
        queued_players.contains_key(&player_id)
    }

    pub async fn queue_length(&self, game_type: GameType) -> usize {
        let queues = self.queues.read().await;
        queues.get(&game_type).map(|q| q.len()).unwrap_or(0)
    }

    pub async fn total_queued(&self) -> usize {
        let queued_players = self.queued_players.read().await;
        queued_players.len()
    }
}

fn form_match(
    queue: &mut VecDeque<QueuedPlayer>,
    now: Instant,
    min_players: usize,
    max_players: usize,
    widen: &dyn WidenStrategy,
) -> Option<Vec<PlayerId>> {
    let anchor = queue.front()?;
    let anchor_tier = anchor.skill_tier;
    let anchor_gap = widen.allowed_gap(now.duration_since(anchor.queued_at));

    let mut picked = vec![0usize];
    for (index, candidate) in queue.iter().enumerate().skip(1) {
        if picked.len() >= max_players {
            break;
        }
        let gap = candidate.skill_tier.abs_diff(anchor_tier);
        let candidate_gap = widen.allowed_gap(now.duration_since(candidate.queued_at));
        if gap <= anchor_gap.min(candidate_gap) {
            picked.push(index);
        }
    }

    if picked.len() < min_players {
        return None;
    }

    // Remove back to front so earlier indices stay valid.
    let mut players = Vec::with_capacity(picked.len());
    for &index in picked.iter().rev() {
        if let Some(player) = queue.remove(index) {
            players.push(player.player_id);
        }
    }
    players.reverse();
    Some(players)
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn strict_queue(min: usize, max: usize) -> MatchmakingQueue {
        // Gap never widens, so only equal tiers match.
        MatchmakingQueue::new_with_config(
            min,
            max,
            Duration::from_secs(300),
            Box::new(StepWiden {
                step: Duration::from_secs(3600),
                max_gap: 3,
            }),
        )
    }

    #[tokio::test]
    async fn test_basic_queue_operations() {
        let queue = MatchmakingQueue::new();
        let player = Uuid::new_v4();

        let position = queue
            .add_player(player, GameType::SpeedRace, 2)
            .await
            .unwrap();
        assert_eq!(position, 1);
        assert_eq!(queue.queue_length(GameType::SpeedRace).await, 1);
        assert!(queue.is_player_in_queue(player).await);

        queue.remove_player(player).await.unwrap();
        assert_eq!(queue.queue_length(GameType::SpeedRace).await, 0);
        assert!(!queue.is_player_in_queue(player).await);
    }

    #[tokio::test]
    async fn test_requeue_replaces_prior_entry() {
        let queue = MatchmakingQueue::new();
        let player = Uuid::new_v4();

        assert!(queue.add_player(player, GameType::Blink, 1).await.is_ok());

        // Queueing again moves the player to the new game type.
        assert!(
            queue
                .add_player(player, GameType::SpeedRace, 2)
                .await
                .is_ok()
        );
        assert_eq!(queue.total_queued().await, 1);
        assert_eq!(queue.queue_length(GameType::Blink).await, 0);
        assert_eq!(queue.queue_length(GameType::SpeedRace).await, 1);
    }

    #[tokio::test]
    async fn test_remove_nonexistent_player() {
        let queue = MatchmakingQueue::new();
        let result = queue.remove_player(Uuid::new_v4()).await;
        assert_eq!(result.unwrap_err(), "Player not in queue");
    }

    #[tokio::test]
    async fn test_queues_are_isolated_per_game_type() {
        let queue = strict_queue(2, 4);
        queue
            .add_player(Uuid::new_v4(), GameType::Blink, 1)
            .await
            .unwrap();
        queue
            .add_player(Uuid::new_v4(), GameType::SpeedRace, 1)
            .await
            .unwrap();

        // Same tier, different game types: never matched together.
        assert!(queue.try_create_matches().await.is_empty());
    }

    #[tokio::test]
    async fn test_match_requires_min_players_in_tier() {
        let queue = strict_queue(2, 4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        queue.add_player(a, GameType::Blink, 1).await.unwrap();
        assert!(queue.try_create_matches().await.is_empty());

        // Tier 3 is outside a fresh tier-1 player's window.
        queue
            .add_player(Uuid::new_v4(), GameType::Blink, 3)
            .await
            .unwrap();
        assert!(queue.try_create_matches().await.is_empty());

        queue.add_player(b, GameType::Blink, 1).await.unwrap();
        let matches = queue.try_create_matches().await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].game_type, GameType::Blink);
        assert_eq!(matches[0].players, vec![a, b]);

        // The tier-3 player keeps waiting.
        assert_eq!(queue.queue_length(GameType::Blink).await, 1);
    }

    #[tokio::test]
    async fn test_match_respects_max_players() {
        let queue = strict_queue(2, 3);
        let mut players = Vec::new();
        for _ in 0..5 {
            let id = Uuid::new_v4();
            queue.add_player(id, GameType::TypingWalk, 2).await.unwrap();
            players.push(id);
        }

        let matches = queue.try_create_matches().await;
        // Five equal-tier players split into a full match of 3 and a pair.
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].players.len(), 3);
        assert_eq!(matches[0].players, players[..3].to_vec());
        assert_eq!(matches[1].players.len(), 2);
        assert_eq!(queue.queue_length(GameType::TypingWalk).await, 0);
    }

    #[tokio::test]
    async fn test_window_widens_with_wait_time() {
        let queue = MatchmakingQueue::new_with_config(
            2,
            4,
            Duration::from_secs(300),
            Box::new(StepWiden {
                step: Duration::from_millis(5),
                max_gap: 3,
            }),
        );
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue.add_player(a, GameType::FallingWords, 1).await.unwrap();
        queue.add_player(b, GameType::FallingWords, 3).await.unwrap();

        assert!(queue.try_create_matches().await.is_empty());

        // After both have waited past two widening steps the gap of 2 fits.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let matches = queue.try_create_matches().await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].players, vec![a, b]);
    }

    #[tokio::test]
    async fn test_step_widen_is_monotonic_and_capped() {
        let widen = StepWiden {
            step: Duration::from_secs(10),
            max_gap: 3,
        };
        assert_eq!(widen.allowed_gap(Duration::ZERO), 0);
        assert_eq!(widen.allowed_gap(Duration::from_secs(9)), 0);
        assert_eq!(widen.allowed_gap(Duration::from_secs(10)), 1);
        assert_eq!(widen.allowed_gap(Duration::from_secs(25)), 2);
        assert_eq!(widen.allowed_gap(Duration::from_secs(3600)), 3);
    }

    #[tokio::test]
    async fn test_queue_timeout_is_configurable() {
        let queue = MatchmakingQueue::with_queue_timeout(Duration::from_millis(10));
        let player = Uuid::new_v4();
        queue
            .add_player(player, GameType::SpeedRace, 1)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.cleanup_expired_players().await, vec![player]);
        assert_eq!(queue.total_queued().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired_players() {
        let queue = MatchmakingQueue::new_with_config(
            2,
            4,
            Duration::from_millis(10),
            Box::new(StepWiden {
                step: Duration::from_secs(10),
                max_gap: 3,
            }),
        );

        let mut players = Vec::new();
        for _ in 0..3 {
            let id = Uuid::new_v4();
            queue.add_player(id, GameType::Blink, 1).await.unwrap();
            players.push(id);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut expired = queue.cleanup_expired_players().await;
        expired.sort();
        players.sort();

        assert_eq!(expired, players);
        assert_eq!(queue.total_queued().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_queue_operations() {
        let queue = std::sync::Arc::new(strict_queue(2, 4));
        let mut handles = Vec::new();

        for _ in 0..20 {
            let queue_clone = queue.clone();
            handles.push(tokio::spawn(async move {
                let id = Uuid::new_v4();
                queue_clone
                    .add_player(id, GameType::SpeedRace, 1)
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
                queue_clone.remove_player(id).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.total_queued().await, 0);
        assert_eq!(queue.queue_length(GameType::SpeedRace).await, 0);
    }

    #[tokio::test]
    async fn test_empty_queue_operations() {
        let queue = MatchmakingQueue::new();
        assert!(queue.try_create_matches().await.is_empty());
        assert!(queue.cleanup_expired_players().await.is_empty());
        assert_eq!(queue.total_queued().await, 0);
    }
}

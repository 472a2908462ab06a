//! Number-guessing game rules. Rounds live only in memory; there is no
//! persistence and no identity requirement. Finished rounds are dropped
//! on their final guess, and rounds nobody touches for a while are
//! evicted by the periodic sweeper.

use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const MIN_NUMBER: i32 = 1;
pub const MAX_NUMBER: i32 = 100;
pub const MAX_ATTEMPTS: u32 = 10;
pub const POINTS_PER_ATTEMPT: i32 = 10;

/// How long an unfinished round may sit idle before eviction.
pub const ROUND_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum GuessError {
    #[error("guess must be between {MIN_NUMBER} and {MAX_NUMBER}")]
    OutOfRange,
    #[error("this round is already finished")]
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone)]
pub struct GuessGame {
    secret: i32,
    pub attempts: u32,
    pub status: GameStatus,
    pub history: Vec<i32>,
    last_activity: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum GuessOutcome {
    Higher,
    Lower,
    Correct { points: i32 },
    GameOver { secret: i32 },
}

impl GuessGame {
    pub fn new() -> Self {
        let secret = rand::rng().random_range(MIN_NUMBER..=MAX_NUMBER);
        Self::with_secret(secret)
    }

    pub fn with_secret(secret: i32) -> Self {
        Self {
            secret,
            attempts: 0,
            status: GameStatus::Playing,
            history: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn attempts_remaining(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.attempts)
    }

    /// A round is stale once it has gone untouched for `ttl`.
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_activity) >= ttl
    }

    /// Evaluate one guess. Out-of-range input is rejected without
    /// consuming an attempt; finished rounds accept no further guesses.
    pub fn guess(&mut self, value: i32) -> Result<GuessOutcome, GuessError> {
        if self.status != GameStatus::Playing {
            return Err(GuessError::Finished);
        }
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&value) {
            return Err(GuessError::OutOfRange);
        }

        self.attempts += 1;
        self.history.push(value);
        self.last_activity = Instant::now();

        if value == self.secret {
            self.status = GameStatus::Won;
            let points = (MAX_ATTEMPTS - self.attempts + 1) as i32 * POINTS_PER_ATTEMPT;
            Ok(GuessOutcome::Correct { points })
        } else if self.attempts >= MAX_ATTEMPTS {
            self.status = GameStatus::Lost;
            Ok(GuessOutcome::GameOver { secret: self.secret })
        } else if value < self.secret {
            Ok(GuessOutcome::Higher)
        } else {
            Ok(GuessOutcome::Lower)
        }
    }
}

impl Default for GuessGame {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop rounds that are finished or idle past `ttl`; returns how many
/// were evicted. The round map otherwise only ever grows.
pub fn evict_rounds(games: &mut HashMap<Uuid, GuessGame>, now: Instant, ttl: Duration) -> usize {
    let before = games.len();
    games.retain(|_, game| game.status == GameStatus::Playing && !game.is_stale(now, ttl));
    before - games.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_secret_in_range() {
        for _ in 0..100 {
            let game = GuessGame::new();
            assert!((MIN_NUMBER..=MAX_NUMBER).contains(&game.secret));
        }
    }

    #[test]
    fn low_guess_hints_higher() {
        let mut game = GuessGame::with_secret(50);
        assert_eq!(game.guess(10).unwrap(), GuessOutcome::Higher);
        assert_eq!(game.attempts, 1);
        assert_eq!(game.history, vec![10]);
    }

    #[test]
    fn high_guess_hints_lower() {
        let mut game = GuessGame::with_secret(50);
        assert_eq!(game.guess(90).unwrap(), GuessOutcome::Lower);
    }

    #[test]
    fn correct_first_guess_scores_full_points() {
        let mut game = GuessGame::with_secret(42);
        assert_eq!(game.guess(42).unwrap(), GuessOutcome::Correct { points: 100 });
        assert_eq!(game.status, GameStatus::Won);
    }

    #[test]
    fn points_shrink_with_attempts() {
        let mut game = GuessGame::with_secret(42);
        game.guess(1).unwrap();
        game.guess(2).unwrap();
        // Third attempt correct: (10 - 3 + 1) * 10.
        assert_eq!(game.guess(42).unwrap(), GuessOutcome::Correct { points: 80 });
    }

    #[test]
    fn tenth_miss_loses_and_reveals_secret() {
        let mut game = GuessGame::with_secret(42);
        for i in 1..=9 {
            assert_eq!(game.guess(i).unwrap(), GuessOutcome::Higher);
        }
        assert_eq!(game.guess(10).unwrap(), GuessOutcome::GameOver { secret: 42 });
        assert_eq!(game.status, GameStatus::Lost);
    }

    #[test]
    fn out_of_range_does_not_consume_attempt() {
        let mut game = GuessGame::with_secret(42);
        assert!(matches!(game.guess(0), Err(GuessError::OutOfRange)));
        assert!(matches!(game.guess(101), Err(GuessError::OutOfRange)));
        assert_eq!(game.attempts, 0);
        assert!(game.history.is_empty());
    }

    #[test]
    fn finished_round_rejects_guesses() {
        let mut game = GuessGame::with_secret(42);
        game.guess(42).unwrap();
        assert!(matches!(game.guess(42), Err(GuessError::Finished)));
        assert_eq!(game.attempts, 1);
    }

    // ---- eviction ----

    #[test]
    fn fresh_round_is_not_stale() {
        let game = GuessGame::with_secret(42);
        assert!(!game.is_stale(Instant::now(), ROUND_IDLE_TTL));
    }

    #[test]
    fn round_goes_stale_after_ttl() {
        let game = GuessGame::with_secret(42);
        let later = Instant::now() + ROUND_IDLE_TTL;
        assert!(game.is_stale(later, ROUND_IDLE_TTL));
    }

    #[test]
    fn evict_drops_finished_and_idle_rounds() {
        let mut games = HashMap::new();
        let ttl = Duration::from_secs(60);

        games.insert(Uuid::from_u128(1), GuessGame::with_secret(42));

        let mut won = GuessGame::with_secret(42);
        won.guess(42).unwrap();
        games.insert(Uuid::from_u128(2), won);

        let mut lost = GuessGame::with_secret(42);
        for i in 1..=10 {
            lost.guess(i).unwrap();
        }
        games.insert(Uuid::from_u128(3), lost);

        // Capture `now` after the rounds exist so every `last_activity`
        // is at or before it.
        let now = Instant::now();

        // A live round under the ttl survives; finished rounds do not.
        assert_eq!(evict_rounds(&mut games, now, ttl), 2);
        assert_eq!(games.len(), 1);
        assert!(games.contains_key(&Uuid::from_u128(1)));

        // The survivor is evicted once it has idled past the ttl.
        assert_eq!(evict_rounds(&mut games, now + ttl, ttl), 1);
        assert!(games.is_empty());
    }
}

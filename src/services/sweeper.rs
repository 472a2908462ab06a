//! Periodic auto-submit of exam sessions whose countdown has run out,
//! plus eviction of abandoned in-memory guessing-game rounds.
//!
//! The countdown crossing zero is the sole timeout trigger and must be
//! indistinguishable from a manual submit. The sweeper reuses the same
//! close path as the submit endpoint, which only flips rows still marked
//! `submitted = false`, so a user submitting in the same instant does not
//! produce a second submission.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::services::{exam_flow, guess};
use crate::AppState;

pub struct SessionSweeper {
    state: Arc<AppState>,
}

impl SessionSweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// One sweep: find every open session past its deadline and close it.
    pub async fn run_sweep(&self) {
        let expired = match exam_flow::expired_open_sessions(&self.state.db.pool).await {
            Ok(sessions) => sessions,
            Err(e) => {
                error!("Failed to query expired exam sessions: {:?}", e);
                return;
            }
        };

        if expired.is_empty() {
            return;
        }

        info!("Found {} expired exam sessions to auto-submit", expired.len());

        for session in expired {
            match exam_flow::close_session(&self.state.db.pool, &session).await {
                Ok(result) if result.closed_now => {
                    info!(
                        "Auto-submitted exam session {} with score {}/{}",
                        session.id, result.score, result.total_questions
                    );
                }
                // Closed by a manual submit between the query and here.
                Ok(_) => {}
                Err(e) => {
                    error!("Failed to auto-submit exam session {}: {:?}", session.id, e);
                }
            }
        }
    }

    /// Drop guessing-game rounds that finished or went idle; without this
    /// the round map grows for the life of the process.
    pub async fn evict_stale_games(&self) {
        let mut games = self.state.games.write().await;
        let evicted = guess::evict_rounds(&mut games, Instant::now(), guess::ROUND_IDLE_TTL);
        if evicted > 0 {
            info!("Evicted {} stale guessing-game rounds", evicted);
        }
    }
}

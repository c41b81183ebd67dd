use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;

use super::broadcaster::{Broadcaster, Outbox, RoundTimeout};
use super::scoring;
use super::session::{GameState, Session};
use super::store::{SessionStore, SharedSession};
use super::{GameSettings, JoinCode};
use crate::backend::{GameResult, QuizSource, ResultQueue};
use crate::error::{GameError, Result};

/// What happened to a submitted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Recorded,
    /// The answer was the last one outstanding and closed the round
    RoundClosed,
    /// Already answered this round; nothing changed
    Duplicate,
}

/// Drives sessions through question, results and end
///
/// Every transition happens while holding the session's lock, and every
/// transition re-checks `game_state` (and the round number for timer
/// expiry) under that lock. A timer fire racing the last answer therefore
/// resolves to exactly one scoring pass: whichever takes the lock first
/// moves the session out of `question`, and the other sees that and does
/// nothing.
pub struct RoundEngine {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    quizzes: Arc<dyn QuizSource>,
    results: ResultQueue,
    settings: GameSettings,
    timeout_receiver: RwLock<Option<mpsc::UnboundedReceiver<RoundTimeout>>>,
}

impl RoundEngine {
    pub fn new(
        store: Arc<SessionStore>,
        broadcaster: Arc<Broadcaster>,
        quizzes: Arc<dyn QuizSource>,
        results: ResultQueue,
        settings: GameSettings,
        timeout_receiver: mpsc::UnboundedReceiver<RoundTimeout>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            quizzes,
            results,
            settings,
            timeout_receiver: RwLock::new(Some(timeout_receiver)),
        }
    }

    /// Spawns the task that turns timer fires into round expiry
    pub fn start_timeout_processing(self: Arc<Self>) {
        let engine = self.clone();

        tokio::spawn(async move {
            let receiver = {
                let mut receiver_guard = engine.timeout_receiver.write().await;
                receiver_guard.take()
            };

            if let Some(mut rx) = receiver {
                while let Some(timeout) = rx.recv().await {
                    if let Err(e) = engine.expire_round(timeout).await {
                        tracing::debug!(
                            join_code = timeout.join_code,
                            error = %e,
                            "Round timeout not applied"
                        );
                    }
                }
            }
        });
    }

    async fn session(&self, code: JoinCode) -> Result<SharedSession> {
        self.store.get(code).await.ok_or(GameError::RoomNotFound(code))
    }

    /// Host action: load the quiz and open the first round
    pub async fn start_game(&self, socket_id: &str, code: JoinCode) -> Result<()> {
        let handle = self.session(code).await?;

        let quiz_id = {
            let session = handle.lock().await;
            Self::check_host(&session, socket_id)?;
            Self::check_state(&session, GameState::Waiting)?;
            session.quiz_id.clone()
        };

        // The lookup happens without the lock; the state is re-checked below.
        let quiz = self
            .quizzes
            .fetch_quiz(&quiz_id)
            .await?
            .ok_or_else(|| GameError::QuizNotFound(quiz_id.clone()))?;
        if quiz.questions.is_empty() {
            return Err(GameError::EmptyQuiz(quiz_id));
        }

        let mut outbox = Outbox::new();
        {
            let mut session = handle.lock().await;
            Self::check_state(&session, GameState::Waiting)?;

            session.questions = quiz.questions;
            session.current_question_index = 0;
            Self::begin_round(&mut session);
            self.store.promote(code).await;

            tracing::info!(
                join_code = code,
                quiz_id = %session.quiz_id,
                players = session.player_count(),
                questions = session.questions.len(),
                "Game started"
            );
            self.broadcaster.push(&mut session, &mut outbox);
        }
        self.broadcaster.deliver(outbox).await;
        Ok(())
    }

    pub async fn submit_answer(
        &self,
        socket_id: &str,
        code: JoinCode,
        option_index: usize,
    ) -> Result<AnswerOutcome> {
        let handle = self.session(code).await?;
        let mut outbox = Outbox::new();

        let outcome = {
            let mut session = handle.lock().await;
            Self::check_state(&session, GameState::Question)?;

            let option_count = session.current_question().map_or(0, |q| q.options.len());
            let participant = session
                .participant_mut(socket_id)
                .filter(|p| p.is_player())
                .ok_or_else(|| GameError::NotParticipant(socket_id.to_string()))?;

            if participant.answered {
                tracing::debug!(join_code = code, socket_id = %socket_id, "Duplicate answer ignored");
                return Ok(AnswerOutcome::Duplicate);
            }
            if option_index >= option_count {
                return Err(GameError::InvalidOption(option_index));
            }

            participant.answered = true;
            session.answers.insert(socket_id.to_string(), option_index);
            tracing::debug!(join_code = code, socket_id = %socket_id, option = option_index, "Answer recorded");

            if self.settle_if_complete(&handle, &mut session, &mut outbox) {
                AnswerOutcome::RoundClosed
            } else {
                self.broadcaster.push(&mut session, &mut outbox);
                AnswerOutcome::Recorded
            }
        };

        self.broadcaster.deliver(outbox).await;
        Ok(outcome)
    }

    /// Host action: open the next round after results
    pub async fn next_question(&self, socket_id: &str, code: JoinCode) -> Result<()> {
        let handle = self.session(code).await?;
        let mut outbox = Outbox::new();
        {
            let mut session = handle.lock().await;
            Self::check_host(&session, socket_id)?;
            Self::check_state(&session, GameState::Results)?;

            if session.is_last_question() {
                self.end_game(&handle, &mut session, &mut outbox);
            } else {
                session.current_question_index += 1;
                Self::begin_round(&mut session);
                tracing::info!(
                    join_code = code,
                    question_index = session.current_question_index,
                    "Next question"
                );
                self.broadcaster.push(&mut session, &mut outbox);
            }
        }
        self.broadcaster.deliver(outbox).await;
        Ok(())
    }

    /// Closes the round named by a timer fire, unless it already closed.
    /// Returns whether this call closed it.
    pub async fn expire_round(&self, timeout: RoundTimeout) -> Result<bool> {
        let handle = self.session(timeout.join_code).await?;
        let mut outbox = Outbox::new();
        {
            let mut session = handle.lock().await;
            if session.closed
                || session.game_state != GameState::Question
                || session.round != timeout.round
            {
                tracing::debug!(
                    join_code = timeout.join_code,
                    round = timeout.round,
                    "Stale round timeout ignored"
                );
                return Ok(false);
            }

            tracing::info!(
                join_code = timeout.join_code,
                answered = session.answered_count(),
                players = session.player_count(),
                "Round timed out"
            );
            self.close_round(&handle, &mut session, &mut outbox);
        }
        self.broadcaster.deliver(outbox).await;
        Ok(true)
    }

    /// Closes the round if every online player has answered. Called with
    /// the session lock held, after an answer or a player leaving.
    pub fn settle_if_complete(
        &self,
        handle: &SharedSession,
        session: &mut Session,
        outbox: &mut Outbox,
    ) -> bool {
        if session.game_state != GameState::Question || !session.all_online_players_answered() {
            return false;
        }
        tracing::info!(join_code = session.join_code, "All players answered, closing round");
        self.close_round(handle, session, outbox);
        true
    }

    /// `question -> results`, then `results -> end` after the last question
    fn close_round(&self, handle: &SharedSession, session: &mut Session, outbox: &mut Outbox) {
        if session.game_state != GameState::Question {
            return;
        }
        session.round_timer = None;
        Self::score_round(session);
        session.game_state = GameState::Results;
        self.broadcaster.push(session, outbox);

        if session.is_last_question() {
            self.end_game(handle, session, outbox);
        }
    }

    fn end_game(&self, handle: &SharedSession, session: &mut Session, outbox: &mut Outbox) {
        session.round_timer = None;
        session.game_state = GameState::End;
        self.broadcaster.push(session, outbox);

        tracing::info!(join_code = session.join_code, "Game ended");

        if !session.results_recorded {
            session.results_recorded = true;
            self.results.emit(GameResult {
                join_code: session.join_code,
                quiz_id: session.quiz_id.clone(),
                host_id: session.host_id.clone(),
                standings: session.standings(),
            });
        }

        self.schedule_removal(session.join_code, handle.clone());
    }

    /// Drops a finished session after the grace period, so late readers
    /// still see the final standings
    fn schedule_removal(&self, code: JoinCode, handle: SharedSession) {
        let store = self.store.clone();
        let grace = self.settings.end_grace;
        tokio::spawn(async move {
            sleep(grace).await;
            handle.lock().await.closed = true;
            if store.remove_if_same(code, &handle).await {
                tracing::info!(join_code = code, "Finished session removed");
            }
        });
    }

    fn begin_round(session: &mut Session) {
        session.answers.clear();
        for participant in session.participants.iter_mut() {
            participant.answered = false;
        }
        session.round += 1;
        session.round_timer = None;
        session.game_state = GameState::Question;
    }

    /// Awards the current question's points to every online player whose
    /// answer matches the correct option
    fn score_round(session: &mut Session) {
        let Some(question) = session.current_question() else {
            return;
        };
        let Some(correct) = question.correct_index() else {
            tracing::warn!(join_code = session.join_code, "Question has no correct option");
            return;
        };
        let points = scoring::award(question.points);

        let answers = &session.answers;
        for participant in session.participants.iter_mut() {
            if participant.is_player()
                && participant.is_online
                && answers.get(&participant.socket_id) == Some(&correct)
            {
                participant.score += points;
            }
        }
    }

    fn check_host(session: &Session, socket_id: &str) -> Result<()> {
        if session.closed {
            return Err(GameError::RoomNotFound(session.join_code));
        }
        if !session.is_host(socket_id) {
            return Err(GameError::NotHost(socket_id.to_string()));
        }
        Ok(())
    }

    fn check_state(session: &Session, expected: GameState) -> Result<()> {
        if session.closed {
            return Err(GameError::RoomNotFound(session.join_code));
        }
        if session.game_state != expected {
            return Err(GameError::InvalidState(session.game_state.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingSink;
    use crate::backend::{AnswerOption, Question, Quiz, StaticQuizSource};
    use crate::game::session::Participant;
    use crate::game::ServerMessage;
    use std::time::Duration;

    struct Harness {
        engine: Arc<RoundEngine>,
        store: Arc<SessionStore>,
        sink: Arc<RecordingSink>,
        host_rx: mpsc::UnboundedReceiver<ServerMessage>,
        handle: SharedSession,
    }

    fn question(correct: usize, points: u32, limit: u64) -> Question {
        Question {
            text: format!("correct is {}", correct),
            image_url: None,
            points,
            time_limit_secs: limit,
            options: (0..3)
                .map(|i| AnswerOption {
                    text: format!("option {}", i),
                    is_correct: i == correct,
                })
                .collect(),
        }
    }

    /// A lobby session with a host and `players` players, p1..pN
    async fn harness(questions: Vec<Question>, players: usize) -> Harness {
        let store = Arc::new(SessionStore::new());
        let (timeout_tx, timeout_rx) = mpsc::unbounded_channel();
        let broadcaster = Arc::new(Broadcaster::new(timeout_tx));
        let quizzes = Arc::new(StaticQuizSource::with_quizzes(vec![Quiz {
            id: "quiz".to_string(),
            title: "Test".to_string(),
            questions,
        }]));
        let sink = Arc::new(RecordingSink::default());
        let engine = Arc::new(RoundEngine::new(
            store.clone(),
            broadcaster.clone(),
            quizzes,
            ResultQueue::new(sink.clone()),
            GameSettings::default(),
            timeout_rx,
        ));
        engine.clone().start_timeout_processing();

        let mut session = Session::new(123456, "quiz".into(), "host-user".into(), "host".into());
        for i in 1..=players {
            session.participants.push(Participant::player(
                format!("p{}", i),
                format!("u{}", i),
                format!("Player {}", i),
                None,
            ));
        }
        let handle = store.create(session).await.unwrap();

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        broadcaster.register("host".to_string(), host_tx).await;

        Harness { engine, store, sink, host_rx, handle }
    }

    async fn score_of(handle: &SharedSession, socket_id: &str) -> u32 {
        handle.lock().await.participant(socket_id).unwrap().score
    }

    async fn state_of(handle: &SharedSession) -> GameState {
        handle.lock().await.game_state
    }

    #[tokio::test]
    async fn test_start_game_requires_host() {
        let h = harness(vec![question(0, 10, 30)], 1).await;

        let err = h.engine.start_game("p1", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::NotHost(_)));
        assert_eq!(state_of(&h.handle).await, GameState::Waiting);

        h.engine.start_game("host", 123456).await.unwrap();
        assert_eq!(state_of(&h.handle).await, GameState::Question);
        assert!(h.store.is_active(123456).await);

        // only once
        let err = h.engine.start_game("host", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_start_game_with_missing_or_empty_quiz() {
        let mut h = harness(vec![], 1).await;
        let err = h.engine.start_game("host", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::EmptyQuiz(_)));

        h.handle.lock().await.quiz_id = "missing".to_string();
        let err = h.engine.start_game("host", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::QuizNotFound(_)));

        assert_eq!(state_of(&h.handle).await, GameState::Waiting);
        assert!(!h.store.is_active(123456).await);
        assert!(h.host_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_sends_host_view() {
        let mut h = harness(vec![question(1, 10, 30)], 1).await;
        h.engine.start_game("host", 123456).await.unwrap();

        let message = h.host_rx.try_recv().unwrap();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "game-update");
        assert_eq!(json["view"]["state"], "question");
        assert_eq!(json["view"]["question"]["correct_index"], 1);
    }

    #[tokio::test]
    async fn test_answer_validation() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 2).await;

        // not started yet
        let err = h.engine.submit_answer("p1", 123456, 1).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        h.engine.start_game("host", 123456).await.unwrap();

        let err = h.engine.submit_answer("host", 123456, 1).await.unwrap_err();
        assert!(matches!(err, GameError::NotParticipant(_)));
        let err = h.engine.submit_answer("stranger", 123456, 1).await.unwrap_err();
        assert!(matches!(err, GameError::NotParticipant(_)));
        let err = h.engine.submit_answer("p1", 123456, 7).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidOption(7)));
        let err = h.engine.submit_answer("p1", 999999, 1).await.unwrap_err();
        assert!(matches!(err, GameError::RoomNotFound(999999)));

        assert_eq!(h.engine.submit_answer("p1", 123456, 1).await.unwrap(), AnswerOutcome::Recorded);
        assert_eq!(h.engine.submit_answer("p1", 123456, 0).await.unwrap(), AnswerOutcome::Duplicate);

        let session = h.handle.lock().await;
        assert_eq!(session.answers.get("p1"), Some(&1));
        assert_eq!(session.answers.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_answered_closes_round_and_timer_is_noop() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 2).await;
        h.engine.start_game("host", 123456).await.unwrap();

        h.engine.submit_answer("p1", 123456, 1).await.unwrap();
        let outcome = h.engine.submit_answer("p2", 123456, 1).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::RoundClosed);
        assert_eq!(state_of(&h.handle).await, GameState::Results);
        assert_eq!(score_of(&h.handle, "p1").await, 10);
        assert_eq!(score_of(&h.handle, "p2").await, 10);
        assert!(h.handle.lock().await.round_timer.is_none());

        // a late fire for the closed round changes nothing
        let round = h.handle.lock().await.round;
        let applied = h
            .engine
            .expire_round(RoundTimeout { join_code: 123456, round })
            .await
            .unwrap();
        assert!(!applied);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(state_of(&h.handle).await, GameState::Results);
        assert_eq!(score_of(&h.handle, "p1").await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_closes_round() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 2).await;
        h.engine.start_game("host", 123456).await.unwrap();
        h.engine.submit_answer("p1", 123456, 1).await.unwrap();

        sleep(Duration::from_secs(29)).await;
        assert_eq!(state_of(&h.handle).await, GameState::Question);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(state_of(&h.handle).await, GameState::Results);
        assert_eq!(score_of(&h.handle, "p1").await, 10);
        assert_eq!(score_of(&h.handle, "p2").await, 0);

        // answering after the round closed never scores
        let err = h.engine.submit_answer("p2", 123456, 1).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
        assert_eq!(score_of(&h.handle, "p2").await, 0);
    }

    #[tokio::test]
    async fn test_racing_timeout_and_last_answer_score_once() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 1).await;
        h.engine.start_game("host", 123456).await.unwrap();
        let round = h.handle.lock().await.round;

        let timeout = RoundTimeout { join_code: 123456, round };
        let (expired, answered) = tokio::join!(
            h.engine.expire_round(timeout),
            h.engine.submit_answer("p1", 123456, 1),
        );

        let expired = expired.unwrap();
        match answered {
            // answer won: it closed the round, the timeout was stale
            Ok(AnswerOutcome::RoundClosed) => assert!(!expired),
            // timeout won: the answer arrived after results
            Err(GameError::InvalidState(_)) => assert!(expired),
            other => panic!("Unexpected answer outcome: {:?}", other),
        }
        assert_eq!(state_of(&h.handle).await, GameState::Results);
        let score = score_of(&h.handle, "p1").await;
        assert!(score == 0 || score == 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_timeout_and_last_answer_score_once() {
        for _ in 0..200 {
            let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 1).await;
            h.engine.start_game("host", 123456).await.unwrap();
            let round = h.handle.lock().await.round;

            let expiring = tokio::spawn({
                let engine = h.engine.clone();
                async move { engine.expire_round(RoundTimeout { join_code: 123456, round }).await }
            });
            let answering = tokio::spawn({
                let engine = h.engine.clone();
                async move { engine.submit_answer("p1", 123456, 1).await }
            });

            let expired = expiring.await.unwrap().unwrap();
            let answer_won = match answering.await.unwrap() {
                Ok(AnswerOutcome::RoundClosed) => true,
                Err(GameError::InvalidState(_)) => false,
                other => panic!("Unexpected answer outcome: {:?}", other),
            };
            assert_ne!(expired, answer_won);

            let session = h.handle.lock().await;
            assert_eq!(session.game_state, GameState::Results);
            assert_eq!(session.round, round);
            let expected = if answer_won { 10 } else { 0 };
            assert_eq!(session.participant("p1").unwrap().score, expected);
        }
    }

    #[tokio::test]
    async fn test_stale_timeout_leaves_next_round_untouched() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 2).await;
        h.engine.start_game("host", 123456).await.unwrap();
        let first_round = h.handle.lock().await.round;

        h.engine.submit_answer("p1", 123456, 1).await.unwrap();
        h.engine.submit_answer("p2", 123456, 1).await.unwrap();
        h.engine.next_question("host", 123456).await.unwrap();

        // a fire for round one that slipped out before its timer was dropped
        let applied = h
            .engine
            .expire_round(RoundTimeout { join_code: 123456, round: first_round })
            .await
            .unwrap();
        assert!(!applied);

        let session = h.handle.lock().await;
        assert_eq!(session.game_state, GameState::Question);
        assert_eq!(session.current_question_index, 1);
        assert_eq!(session.round, first_round + 1);
        assert!(session.round_timer.is_some());
        assert!(session.players().all(|p| p.score == 10 && !p.answered));
    }

    #[tokio::test]
    async fn test_next_question_advances_by_one() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30), question(2, 5, 30)], 1).await;
        h.engine.start_game("host", 123456).await.unwrap();

        // not in results yet
        let err = h.engine.next_question("host", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        h.engine.submit_answer("p1", 123456, 1).await.unwrap();
        let err = h.engine.next_question("p1", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::NotHost(_)));

        let before = h.handle.lock().await.current_question_index;
        let round_before = h.handle.lock().await.round;
        h.engine.next_question("host", 123456).await.unwrap();

        let session = h.handle.lock().await;
        assert_eq!(session.current_question_index, before + 1);
        assert_eq!(session.round, round_before + 1);
        assert_eq!(session.game_state, GameState::Question);
        assert!(session.answers.is_empty());
        assert!(session.participants.iter().all(|p| !p.answered));
        assert!(session.round_timer.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_round_ends_game_and_records_once() {
        let h = harness(vec![question(0, 10, 30)], 2).await;
        h.engine.start_game("host", 123456).await.unwrap();
        h.engine.submit_answer("p1", 123456, 0).await.unwrap();
        h.engine.submit_answer("p2", 123456, 2).await.unwrap();

        assert_eq!(state_of(&h.handle).await, GameState::End);
        let err = h.engine.next_question("host", 123456).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        sleep(Duration::from_millis(10)).await;
        {
            let results = h.sink.results.lock().await;
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].standings[0].user_id, "u1");
            assert_eq!(results[0].standings[0].score, 10);
            assert_eq!(results[0].standings[1].rank, 2);
        }

        // still readable during the grace period, gone after it
        sleep(Duration::from_secs(30)).await;
        assert!(h.store.exists(123456).await);
        sleep(Duration::from_secs(31)).await;
        assert!(!h.store.exists(123456).await);
        assert!(h.handle.lock().await.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_players_do_not_hold_round_open() {
        let h = harness(vec![question(1, 10, 30), question(0, 10, 30)], 2).await;
        h.engine.start_game("host", 123456).await.unwrap();
        h.handle.lock().await.participant_mut("p2").unwrap().is_online = false;

        let outcome = h.engine.submit_answer("p1", 123456, 1).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::RoundClosed);
    }

    #[test]
    fn test_score_round_only_rewards_online_correct_players() {
        let mut session = Session::new(1, "quiz".into(), "host".into(), "host".into());
        for i in 1..=3 {
            session.participants.push(Participant::player(
                format!("p{}", i),
                format!("u{}", i),
                format!("Player {}", i),
                None,
            ));
        }
        session.questions = vec![question(2, 7, 30)];
        session.answers.insert("p1".into(), 2);
        session.answers.insert("p2".into(), 1);
        session.answers.insert("p3".into(), 2);
        session.participant_mut("p3").unwrap().is_online = false;

        RoundEngine::score_round(&mut session);
        let scores: Vec<u32> = session.players().map(|p| p.score).collect();
        assert_eq!(scores, vec![7, 0, 0]);
    }
}

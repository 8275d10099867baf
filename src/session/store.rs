/// The persistent-store port the session engine talks to.
///
/// All calls are synchronous and block the tick they run in; that is fine
/// because writes only happen on interaction boundaries. No store error is
/// allowed past the engine: callers log and carry on with the in-memory
/// state (the UI proceeds optimistically, no rollback).

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Error taxonomy ──

#[derive(Debug)]
pub enum StoreError {
    /// The store cannot be reached at all. At session construction this puts
    /// the engine into a degraded unsynced mode instead of crashing.
    Unavailable(String),
    /// An individual save call failed. Logged, not retried.
    WriteFailed(String),
    /// A record the caller asked for does not exist.
    NotFound(String),
    /// The store exists but its contents cannot be parsed.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::WriteFailed(msg) => write!(f, "store write failed: {msg}"),
            StoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            StoreError::Corrupt(msg) => write!(f, "store data corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ── Record types ──

/// Per-(student, level) progress row.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SessionProgress {
    /// Seconds left on the countdown, always within [0, 600].
    pub time_remaining: u32,
    pub is_completed: bool,
    pub is_locked: bool,
}

/// Default time budget for a level, in seconds.
pub const TIME_BUDGET: u32 = 600;

impl SessionProgress {
    /// Fresh record for a level never played before.
    /// Only the first level starts unlocked.
    pub fn fresh(level: u8) -> Self {
        SessionProgress {
            time_remaining: TIME_BUDGET,
            is_completed: false,
            is_locked: level > 1,
        }
    }
}

/// Partial update for a progress row: `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgressPatch {
    pub time_remaining: u32,
    pub is_completed: Option<bool>,
    pub is_locked: Option<bool>,
}

impl ProgressPatch {
    pub fn time(time_remaining: u32) -> Self {
        ProgressPatch { time_remaining, ..Default::default() }
    }

    pub fn completed(time_remaining: u32) -> Self {
        ProgressPatch {
            time_remaining,
            is_completed: Some(true),
            ..Default::default()
        }
    }
}

/// One question from a slot's pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    /// 1-based slot the question belongs to.
    pub slot: usize,
    pub text: String,
    /// Matched case-sensitively against the trimmed submitted answer.
    pub answer: String,
    /// Single digit 0-9 revealed on a correct answer.
    pub passcode: u8,
}

/// A student's latest answer to a question. One row per (student, question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub question_id: String,
    pub answer: String,
    pub correct: bool,
}

/// The lore note shown on level entry; `hint` backs the hint overlay.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LevelNote {
    pub title: String,
    pub content: String,
    pub hint: String,
}

/// Explicit student context threaded through the engine; there is no
/// ambient "current user" anywhere.
#[derive(Clone, Debug)]
pub struct StudentSession {
    pub student_id: String,
}

impl StudentSession {
    pub fn new(student_id: impl Into<String>) -> Self {
        StudentSession { student_id: student_id.into() }
    }
}

// ── The port ──

/// Fallback used when no real store can be opened: every call fails with
/// `Unavailable`, which the engine treats as "run unsynced".
pub struct NullStore;

impl ProgressStore for NullStore {
    fn load_session_progress(
        &mut self,
        _student: &str,
        _level: u8,
    ) -> Result<Option<SessionProgress>, StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn save_session_progress(
        &mut self,
        _student: &str,
        _level: u8,
        _patch: ProgressPatch,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn load_question_pool(&mut self, _level: u8) -> Result<Vec<QuestionRecord>, StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn load_submission(
        &mut self,
        _student: &str,
        _question_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn upsert_submission(
        &mut self,
        _student: &str,
        _question_id: &str,
        _answer: &str,
        _correct: bool,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn load_progress_pointer(&mut self, _student: &str) -> Result<u8, StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn advance_progress(
        &mut self,
        _student: &str,
        _points: u32,
        _new_pointer: Option<u8>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn clear_level_submissions(&mut self, _student: &str, _level: u8) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }

    fn load_level_note(&mut self, _level: u8) -> Result<Option<LevelNote>, StoreError> {
        Err(StoreError::Unavailable("no store".into()))
    }
}

pub trait ProgressStore {
    fn load_session_progress(
        &mut self,
        student: &str,
        level: u8,
    ) -> Result<Option<SessionProgress>, StoreError>;

    /// Upserts: creates the row with defaults first if it is absent.
    fn save_session_progress(
        &mut self,
        student: &str,
        level: u8,
        patch: ProgressPatch,
    ) -> Result<(), StoreError>;

    fn load_question_pool(&mut self, level: u8) -> Result<Vec<QuestionRecord>, StoreError>;

    fn load_submission(
        &mut self,
        student: &str,
        question_id: &str,
    ) -> Result<Option<Submission>, StoreError>;

    /// Re-answering overwrites; there is never more than one row per
    /// (student, question).
    fn upsert_submission(
        &mut self,
        student: &str,
        question_id: &str,
        answer: &str,
        correct: bool,
    ) -> Result<(), StoreError>;

    /// The number of the level the student has progressed to.
    fn load_progress_pointer(&mut self, student: &str) -> Result<u8, StoreError>;

    /// Add points to the student's score and, if given, move the pointer.
    fn advance_progress(
        &mut self,
        student: &str,
        points: u32,
        new_pointer: Option<u8>,
    ) -> Result<(), StoreError>;

    /// Wipe every submission the student made for this level (reattempt).
    fn clear_level_submissions(&mut self, student: &str, level: u8) -> Result<(), StoreError>;

    fn load_level_note(&mut self, level: u8) -> Result<Option<LevelNote>, StoreError>;
}

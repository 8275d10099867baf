/// TOML file-backed implementation of the `ProgressStore` port.
///
/// Layout under the data directory:
///   questions.toml    — read-only question bank + level notes (authored by
///                       the lecturer tooling, loaded once at open)
///   students/<id>.toml — everything a student owns: score, progress
///                        pointer, per-level progress rows, submissions
///
/// Student files are small, so every mutation rewrites the whole file. Good
/// enough for a single-process game writing on interaction boundaries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::store::{
    LevelNote, ProgressPatch, ProgressStore, QuestionRecord, SessionProgress, StoreError,
    Submission,
};

const BANK_FILE: &str = "questions.toml";
const STUDENTS_DIR: &str = "students";

// ── On-disk schemas ──

#[derive(Deserialize, Default)]
struct BankFile {
    #[serde(default)]
    level: Vec<BankLevel>,
}

#[derive(Deserialize)]
struct BankLevel {
    number: u8,
    note: Option<LevelNote>,
    #[serde(default)]
    question: Vec<QuestionRecord>,
}

#[derive(Serialize, Deserialize)]
struct StudentFile {
    #[serde(default)]
    score: u32,
    #[serde(default = "first_level")]
    current_level: u8,
    /// Keyed by level number as a string ("1".."5").
    #[serde(default)]
    progress: BTreeMap<String, SessionProgress>,
    #[serde(default)]
    submission: Vec<Submission>,
}

fn first_level() -> u8 {
    1
}

impl Default for StudentFile {
    fn default() -> Self {
        StudentFile {
            score: 0,
            current_level: first_level(),
            progress: BTreeMap::new(),
            submission: Vec::new(),
        }
    }
}

// ── Store ──

pub struct FileStore {
    dir: PathBuf,
    bank: BankFile,
}

impl FileStore {
    /// Open the store rooted at `dir`. Fails with `Unavailable` when the
    /// question bank is missing and `Corrupt` when it does not parse; the
    /// caller decides whether to run degraded.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let bank_path = dir.join(BANK_FILE);
        let text = std::fs::read_to_string(&bank_path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", bank_path.display())))?;
        let bank: BankFile =
            toml::from_str(&text).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        std::fs::create_dir_all(dir.join(STUDENTS_DIR))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(FileStore { dir: dir.to_path_buf(), bank })
    }

    fn student_path(&self, student: &str) -> PathBuf {
        self.dir.join(STUDENTS_DIR).join(format!("{student}.toml"))
    }

    fn load_student(&self, student: &str) -> Result<StudentFile, StoreError> {
        let path = self.student_path(student);
        match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|e| StoreError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StudentFile::default()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    fn save_student(&self, student: &str, file: &StudentFile) -> Result<(), StoreError> {
        let text =
            toml::to_string_pretty(file).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        std::fs::write(self.student_path(student), text)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn bank_level(&self, level: u8) -> Option<&BankLevel> {
        self.bank.level.iter().find(|l| l.number == level)
    }
}

impl ProgressStore for FileStore {
    fn load_session_progress(
        &mut self,
        student: &str,
        level: u8,
    ) -> Result<Option<SessionProgress>, StoreError> {
        let file = self.load_student(student)?;
        Ok(file.progress.get(&level.to_string()).copied())
    }

    fn save_session_progress(
        &mut self,
        student: &str,
        level: u8,
        patch: ProgressPatch,
    ) -> Result<(), StoreError> {
        let mut file = self.load_student(student)?;
        let row = file
            .progress
            .entry(level.to_string())
            .or_insert_with(|| SessionProgress::fresh(level));
        row.time_remaining = patch.time_remaining;
        if let Some(c) = patch.is_completed {
            row.is_completed = c;
        }
        if let Some(l) = patch.is_locked {
            row.is_locked = l;
        }
        self.save_student(student, &file)
    }

    fn load_question_pool(&mut self, level: u8) -> Result<Vec<QuestionRecord>, StoreError> {
        match self.bank_level(level) {
            Some(l) => Ok(l.question.clone()),
            None => Err(StoreError::NotFound(format!("question pool for level {level}"))),
        }
    }

    fn load_submission(
        &mut self,
        student: &str,
        question_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        let file = self.load_student(student)?;
        Ok(file
            .submission
            .iter()
            .find(|s| s.question_id == question_id)
            .cloned())
    }

    fn upsert_submission(
        &mut self,
        student: &str,
        question_id: &str,
        answer: &str,
        correct: bool,
    ) -> Result<(), StoreError> {
        let mut file = self.load_student(student)?;
        match file.submission.iter_mut().find(|s| s.question_id == question_id) {
            Some(row) => {
                row.answer = answer.to_string();
                row.correct = correct;
            }
            None => file.submission.push(Submission {
                question_id: question_id.to_string(),
                answer: answer.to_string(),
                correct,
            }),
        }
        self.save_student(student, &file)
    }

    fn load_progress_pointer(&mut self, student: &str) -> Result<u8, StoreError> {
        Ok(self.load_student(student)?.current_level)
    }

    fn advance_progress(
        &mut self,
        student: &str,
        points: u32,
        new_pointer: Option<u8>,
    ) -> Result<(), StoreError> {
        let mut file = self.load_student(student)?;
        file.score += points;
        if let Some(p) = new_pointer {
            file.current_level = p;
        }
        self.save_student(student, &file)
    }

    fn clear_level_submissions(&mut self, student: &str, level: u8) -> Result<(), StoreError> {
        let level_questions: Vec<String> = match self.bank_level(level) {
            Some(l) => l.question.iter().map(|q| q.id.clone()).collect(),
            None => return Ok(()), // nothing to clear
        };
        let mut file = self.load_student(student)?;
        file.submission.retain(|s| !level_questions.contains(&s.question_id));
        self.save_student(student, &file)
    }

    fn load_level_note(&mut self, level: u8) -> Result<Option<LevelNote>, StoreError> {
        Ok(self.bank_level(level).and_then(|l| l.note.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::TIME_BUDGET;

    const BANK: &str = r#"
[[level]]
number = 1

[level.note]
title = "Capitals"
content = "Read up on European capitals."
hint = "Think west to east."

[[level.question]]
id = "Q101"
slot = 1
text = "Capital of France?"
answer = "Paris"
passcode = 3

[[level.question]]
id = "Q102"
slot = 1
text = "Capital of Spain?"
answer = "Madrid"
passcode = 7

[[level.question]]
id = "Q103"
slot = 2
text = "Capital of Italy?"
answer = "Rome"
passcode = 1

[[level]]
number = 2

[[level.question]]
id = "Q201"
slot = 1
text = "2 + 2?"
answer = "4"
passcode = 9
"#;

    fn open_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BANK_FILE), BANK).unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_bank_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        match FileStore::open(dir.path()) {
            Err(StoreError::Unavailable(_)) => {}
            other => panic!("expected Unavailable, got {other:?}", other = other.err()),
        }
    }

    #[test]
    fn garbled_bank_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BANK_FILE), "level = 3 [[[").unwrap();
        assert!(matches!(FileStore::open(dir.path()), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn absent_progress_reads_as_none() {
        let (_dir, mut store) = open_store();
        assert!(store.load_session_progress("TP001", 1).unwrap().is_none());
    }

    #[test]
    fn progress_patch_round_trip() {
        let (_dir, mut store) = open_store();
        store
            .save_session_progress("TP001", 1, ProgressPatch::time(420))
            .unwrap();
        let row = store.load_session_progress("TP001", 1).unwrap().unwrap();
        assert_eq!(row.time_remaining, 420);
        assert!(!row.is_completed);
        assert!(!row.is_locked); // fresh level-1 row defaults to unlocked

        // Partial update: only the completion flag changes.
        store
            .save_session_progress("TP001", 1, ProgressPatch::completed(420))
            .unwrap();
        let row = store.load_session_progress("TP001", 1).unwrap().unwrap();
        assert!(row.is_completed);
        assert_eq!(row.time_remaining, 420);
    }

    #[test]
    fn fresh_rows_above_level_one_start_locked() {
        let (_dir, mut store) = open_store();
        store
            .save_session_progress("TP001", 2, ProgressPatch::time(TIME_BUDGET))
            .unwrap();
        let row = store.load_session_progress("TP001", 2).unwrap().unwrap();
        assert!(row.is_locked);
    }

    #[test]
    fn submissions_upsert_not_duplicate() {
        let (_dir, mut store) = open_store();
        store.upsert_submission("TP001", "Q101", "paris", false).unwrap();
        store.upsert_submission("TP001", "Q101", "Paris", true).unwrap();

        let row = store.load_submission("TP001", "Q101").unwrap().unwrap();
        assert!(row.correct);
        assert_eq!(row.answer, "Paris");

        // Only one row on disk for the pair.
        let text =
            std::fs::read_to_string(store.student_path("TP001")).unwrap();
        assert_eq!(text.matches("Q101").count(), 1);
    }

    #[test]
    fn clearing_a_level_keeps_other_levels() {
        let (_dir, mut store) = open_store();
        store.upsert_submission("TP001", "Q101", "Paris", true).unwrap();
        store.upsert_submission("TP001", "Q201", "4", true).unwrap();

        store.clear_level_submissions("TP001", 1).unwrap();
        assert!(store.load_submission("TP001", "Q101").unwrap().is_none());
        assert!(store.load_submission("TP001", "Q201").unwrap().is_some());
    }

    #[test]
    fn pointer_and_score_advance() {
        let (_dir, mut store) = open_store();
        assert_eq!(store.load_progress_pointer("TP001").unwrap(), 1);

        store.advance_progress("TP001", 260, Some(2)).unwrap();
        assert_eq!(store.load_progress_pointer("TP001").unwrap(), 2);

        // Points accumulate without moving the pointer.
        store.advance_progress("TP001", 50, None).unwrap();
        assert_eq!(store.load_progress_pointer("TP001").unwrap(), 2);
    }

    #[test]
    fn question_pool_and_note_by_level() {
        let (_dir, mut store) = open_store();
        let pool = store.load_question_pool(1).unwrap();
        assert_eq!(pool.len(), 3);
        assert!(pool.iter().filter(|q| q.slot == 1).count() == 2);

        let note = store.load_level_note(1).unwrap().unwrap();
        assert_eq!(note.title, "Capitals");
        assert!(store.load_level_note(2).unwrap().is_none());

        assert!(matches!(store.load_question_pool(9), Err(StoreError::NotFound(_))));
    }
}

/// Events emitted during a session step.
/// The shell consumes these for logging and presentation cues.

#[derive(Clone, Debug, PartialEq)]
#[allow(dead_code)]
pub enum SessionEvent {
    QuestionOpened { slot: usize },
    AnswerCorrect { slot: usize, passcode: u8 },
    AnswerIncorrect { slot: usize },
    PasscodeRevealed { slot: usize, passcode: u8 },
    PasscodeEntryOpened,
    PasscodeRejected,
    DoorUnlocked,
    Teleported { to: (i32, i32) },
    TimeExpired,
    LevelCompleted { points: u32 },
    ReattemptStarted,
    SessionEnded,
}

/// Entry point and session loop.

mod config;
mod domain;
mod session;
mod ui;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use session::engine::{Action, ExitReason, FrameInput, Overlay, SessionEngine};
use session::file_store::FileStore;
use session::store::{NullStore, ProgressStore, StudentSession};
use ui::input::InputState;
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const LAST_LEVEL: u8 = 5;

fn main() {
    env_logger::init();
    let config = GameConfig::load();

    let mut store: Box<dyn ProgressStore> = match FileStore::open(&config.data_dir) {
        Ok(s) => Box::new(s),
        Err(e) => {
            log::error!("could not open data dir {}: {e}", config.data_dir.display());
            eprintln!("Warning: no question data found, progress will not be saved.");
            Box::new(NullStore)
        }
    };

    let student = StudentSession::new(config.student_id.clone());
    println!("Welcome, {}!", student.student_id);

    loop {
        let Some(level) = choose_level(store.as_mut(), &student) else { break };

        match run_session(&config, store.as_mut(), &student, level) {
            Ok(ExitReason::Completed) => println!("Room {level} escaped!"),
            Ok(ExitReason::TimedUp) => println!("Time ran out in room {level}."),
            Ok(ExitReason::Abandoned) => {}
            Err(e) => {
                eprintln!("Terminal error: {e}");
                break;
            }
        }
    }

    println!("See you next time.");
}

// ── Level select (plain line-mode prompt between sessions) ──

fn choose_level(store: &mut dyn ProgressStore, student: &StudentSession) -> Option<u8> {
    let pointer = match store.load_progress_pointer(&student.student_id) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("progress pointer unavailable, unlocking everything: {e}");
            LAST_LEVEL
        }
    };

    println!();
    println!("Choose a room:");
    for level in 1..=LAST_LEVEL {
        let mark = match store.load_session_progress(&student.student_id, level) {
            Ok(Some(row)) if row.is_completed => "done",
            _ if level > pointer => "locked",
            _ => "open",
        };
        println!("  {level}) Room {level}  [{mark}]");
    }
    println!("  q) Quit");

    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return None;
        }
        match line.trim() {
            "q" | "Q" | "" => return None,
            other => match other.parse::<u8>() {
                Ok(n) if (1..=LAST_LEVEL).contains(&n) && n <= pointer => return Some(n),
                Ok(n) if (1..=LAST_LEVEL).contains(&n) => {
                    println!("Room {n} is still locked.");
                }
                _ => println!("Pick a room number or q."),
            },
        }
    }
}

// ── One level session at the configured tick cadence ──

fn run_session(
    config: &GameConfig,
    store: &mut dyn ProgressStore,
    student: &StudentSession,
    level: u8,
) -> io::Result<ExitReason> {
    let mut rng = rand::rng();
    let mut engine = SessionEngine::new(
        student.clone(),
        level,
        config.session_params(),
        store,
        &mut rng,
    );

    let mut renderer = Renderer::new();
    renderer.init()?;

    // Always restore the terminal, even when the loop errors out.
    let result = session_loop(&mut engine, &mut renderer, config);
    renderer.cleanup()?;
    result
}

fn session_loop(
    engine: &mut SessionEngine,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> io::Result<ExitReason> {
    let mut kb = InputState::new();
    let tick_rate = Duration::from_millis(config.tick_rate_ms);
    let mut last_tick = Instant::now();
    let mut pending: Vec<Action> = Vec::new();

    let reason = loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() {
            pending.push(Action::ExitSession);
        }
        map_keys(&kb, engine.overlay(), &mut pending);

        if last_tick.elapsed() >= tick_rate {
            let input = FrameInput {
                move_x: axis(&kb, KEYS_LEFT, KEYS_RIGHT),
                move_y: axis(&kb, KEYS_UP, KEYS_DOWN),
                actions: std::mem::take(&mut pending),
            };
            let events = engine.step(input);
            for event in &events {
                log::debug!("session event: {event:?}");
            }
            last_tick = Instant::now();
        }

        if let Some(reason) = engine.session_over() {
            break reason;
        }

        renderer.render(engine)?;
        std::thread::sleep(FRAME_SLEEP);
    };

    Ok(reason)
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_INTERACT: &[KeyCode] = &[KeyCode::Char('e'), KeyCode::Char('E')];
const KEYS_DOOR: &[KeyCode] = &[KeyCode::Char('f'), KeyCode::Char('F')];
const KEYS_HINT: &[KeyCode] = &[KeyCode::Char('h'), KeyCode::Char('H')];

fn axis(kb: &InputState, neg: &[KeyCode], pos: &[KeyCode]) -> i32 {
    let mut v = 0;
    if kb.any_held(neg) || kb.any_pressed(neg) {
        v -= 1;
    }
    if kb.any_held(pos) || kb.any_pressed(pos) {
        v += 1;
    }
    v
}

/// Map raw key state onto engine actions for the current overlay. Movement
/// and game keys apply in the room; overlays consume text and navigation.
fn map_keys(kb: &InputState, overlay: Overlay, pending: &mut Vec<Action>) {
    let text_entry = matches!(
        overlay,
        Overlay::QuestionOpen { .. } | Overlay::PasscodeEntryOpen
    );

    if kb.any_pressed(&[KeyCode::Enter]) {
        pending.push(Action::Confirm);
    }

    if kb.any_pressed(&[KeyCode::Esc]) {
        match overlay {
            Overlay::Idle => pending.push(Action::ExitSession),
            Overlay::CompletedPrompt => pending.push(Action::Decline),
            _ => pending.push(Action::CloseOverlay),
        }
    }

    if text_entry {
        for &c in kb.typed_chars() {
            pending.push(Action::Type(c));
        }
        if kb.any_pressed(&[KeyCode::Backspace]) {
            pending.push(Action::Backspace);
        }
        if overlay == Overlay::PasscodeEntryOpen {
            if kb.any_pressed(&[KeyCode::Tab, KeyCode::Right]) {
                pending.push(Action::FocusNext);
            }
            if kb.any_pressed(&[KeyCode::Left]) {
                pending.push(Action::FocusPrev);
            }
        }
        return;
    }

    if overlay == Overlay::Idle {
        if kb.any_pressed(KEYS_INTERACT) {
            pending.push(Action::Interact);
        }
        if kb.any_pressed(KEYS_DOOR) {
            pending.push(Action::UseDoor);
        }
        if kb.any_pressed(KEYS_HINT) {
            pending.push(Action::OpenHint);
        }
    }
}

/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The room is drawn by mapping the level's scaled pixel space onto the
/// available terminal cells; overlays are drawn on top as centered panels.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::geom::Rect;
use crate::session::engine::{FeedbackKind, Overlay, SessionEngine};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, matching the
    /// color used with Clear so inter-row gap pixels blend in.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
    };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
    };

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.ch_len = len;
        cell.fg = fg;
        cell.bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        cell
    }

    fn as_str(&self) -> &str {
        if self.ch_len == 0 {
            return "";
        }
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell::from_char(ch, fg, bg));
            cx += 1;
        }
    }
}

// ── Renderer ──

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap above, message + help below the room view.
const RESERVED_ROWS: usize = MAP_ROW + 4;

const WALL_BG: Color = Color::Rgb { r: 90, g: 90, b: 120 };
const OBSTACLE_BG: Color = Color::Rgb { r: 70, g: 55, b: 40 };
const DOOR_BG: Color = Color::Rgb { r: 120, g: 80, b: 30 };
const EXIT_BG: Color = Color::Rgb { r: 40, g: 110, b: 60 };
const EXIT_LOCKED_BG: Color = Color::Rgb { r: 110, g: 40, b: 40 };
const PANEL_BG: Color = Color::Rgb { r: 35, g: 35, b: 55 };
const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, engine: &SessionEngine) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        self.front.clear();
        self.compose_hud(engine);
        self.compose_room(engine);
        self.compose_message(engine);
        self.compose_help(engine);
        self.compose_overlay(engine);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Set explicit base colors at start of frame. Not ResetColor: that
        // resets to the terminal's native default, which may differ from
        // BASE_BG and cause line artifacts.
        queue!(
            self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.as_str()))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Pixel-space → cell-space mapping ──

    fn view_size(&self) -> (usize, usize) {
        let h = if self.term_h > RESERVED_ROWS { self.term_h - RESERVED_ROWS } else { 1 };
        (self.term_w.max(1), h)
    }

    /// Map a pixel rect into terminal cell coordinates, at least 1x1.
    fn to_cells(&self, engine: &SessionEngine, r: &Rect) -> (usize, usize, usize, usize) {
        let geo = engine.geometry();
        let (vw, vh) = self.view_size();
        let cx = (r.x as i64 * vw as i64 / geo.width.max(1) as i64) as usize;
        let cy = (r.y as i64 * vh as i64 / geo.height.max(1) as i64) as usize;
        let cw = ((r.w as i64 * vw as i64 / geo.width.max(1) as i64) as usize).max(1);
        let ch = ((r.h as i64 * vh as i64 / geo.height.max(1) as i64) as usize).max(1);
        (cx, cy, cw, ch)
    }

    fn fill_rect(&mut self, engine: &SessionEngine, r: &Rect, ch: char, fg: Color, bg: Color) {
        let (cx, cy, cw, chh) = self.to_cells(engine, r);
        for y in cy..cy + chh {
            for x in cx..cx + cw {
                self.front.set(x, MAP_ROW + y, Cell::from_char(ch, fg, bg));
            }
        }
    }

    // ── Compose: build front buffer content ──

    fn compose_hud(&mut self, engine: &SessionEngine) {
        let time = engine.time_remaining();
        let solved = (1..=6).filter(|&s| engine.slot_solved(s)).count();
        let lock = if engine.door_unlocked() { "OPEN" } else { "LOCKED" };
        let sync = if engine.synced() { "" } else { "  [UNSYNCED]" };
        let hud = format!(
            " Room {}  ⏱ {:02}:{:02}  Notes {}/6  Exit:{}{} ",
            engine.level(),
            time / 60,
            time % 60,
            solved,
            lock,
            sync,
        );
        for x in 0..self.front.width {
            self.front.set(x, HUD_ROW, Cell::from_char(' ', Color::White, HUD_BG));
        }
        let fg = if time < 60 { Color::Red } else { Color::White };
        self.front.put_str(0, HUD_ROW, &hud, fg, HUD_BG);
    }

    fn compose_room(&mut self, engine: &SessionEngine) {
        let geo = engine.geometry().clone();

        for wall in &geo.walls {
            self.fill_rect(engine, wall, ' ', Color::White, WALL_BG);
        }
        for ob in &geo.obstacles {
            self.fill_rect(engine, ob, '▒', Color::DarkGrey, OBSTACLE_BG);
        }
        for door in geo.teleport_doors() {
            self.fill_rect(engine, &door.trigger, '≡', Color::Yellow, DOOR_BG);
        }
        let exit_bg = if engine.door_unlocked() { EXIT_BG } else { EXIT_LOCKED_BG };
        let exit_ch = if engine.door_unlocked() { '!' } else { '#' };
        self.fill_rect(engine, &geo.exit_door().trigger, exit_ch, Color::White, exit_bg);

        for slot in &geo.slots {
            let (fg, ch) = if engine.slot_solved(slot.index) {
                (Color::Green, '✓')
            } else {
                (Color::Yellow, '?')
            };
            self.fill_rect(engine, &slot.object, '▪', Color::Grey, Cell::BASE_BG);
            self.fill_rect(engine, &slot.note, ch, fg, Cell::BASE_BG);
        }

        let player = engine.player();
        self.fill_rect(engine, &player, '@', Color::Cyan, Cell::BASE_BG);
    }

    fn compose_message(&mut self, engine: &SessionEngine) {
        let (_, vh) = self.view_size();
        let msg_row = MAP_ROW + vh + 1;
        if msg_row >= self.front.height {
            return;
        }
        let Some(fb) = engine.feedback() else { return };
        let (fg, bg) = match fb.kind {
            FeedbackKind::Success => (Color::Black, Color::Rgb { r: 80, g: 180, b: 80 }),
            FeedbackKind::Warn => (Color::Black, Color::Rgb { r: 200, g: 120, b: 50 }),
            FeedbackKind::Info => (Color::Black, Color::Rgb { r: 200, g: 180, b: 50 }),
        };
        let msg = format!(" ◈ {} ", fb.text);
        for x in 0..self.front.width {
            self.front.set(x, msg_row, Cell::from_char(' ', fg, bg));
        }
        self.front.put_str(0, msg_row, &msg, fg, bg);
    }

    fn compose_help(&mut self, engine: &SessionEngine) {
        let (_, vh) = self.view_size();
        let help_row = MAP_ROW + vh + 3;
        if help_row >= self.front.height {
            return;
        }
        let help = match engine.overlay() {
            Overlay::Idle => " WASD:Move  E:Interact  F:Door  H:Hint  Esc:Leave",
            Overlay::PasscodeEntryOpen => {
                " 0-9:Type  Tab/Arrows:Cell  Enter:Submit  Esc:Close"
            }
            Overlay::QuestionOpen { .. } => " Type your answer  Enter:Submit  Esc:Close",
            Overlay::CompletedPrompt => " Enter:Try again  Esc:Leave",
            _ => " Enter:Continue",
        };
        self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
    }

    fn compose_overlay(&mut self, engine: &SessionEngine) {
        match engine.overlay() {
            Overlay::Idle => {}
            Overlay::NoteReading => {
                let (title, content) = match engine.level_note() {
                    Some(n) => (n.title.clone(), n.content.clone()),
                    None => return,
                };
                let mut lines = vec![title, String::new()];
                lines.extend(wrap(&content, 44));
                lines.push(String::new());
                lines.push("[Enter] Start exploring".into());
                self.panel(&lines);
            }
            Overlay::QuestionOpen { slot } => {
                let question = engine
                    .question_text(slot)
                    .unwrap_or("(no question)")
                    .to_string();
                let mut lines = wrap(&question, 44);
                lines.push(String::new());
                lines.push(format!("> {}_", engine.answer_buffer()));
                self.panel(&lines);
            }
            Overlay::PasscodeRevealOpen { slot } => {
                let digit = engine
                    .revealed_passcode(slot)
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "?".into());
                self.panel(&[
                    "Solved!".into(),
                    String::new(),
                    format!("Passcode digit {slot}:  [ {digit} ]"),
                ]);
            }
            Overlay::PasscodeEntryOpen => {
                let (cells, focus) = engine.passcode_cells();
                let mut row = String::new();
                for (i, cell) in cells.iter().enumerate() {
                    let c = cell.unwrap_or('_');
                    if i == focus {
                        row.push_str(&format!("[{c}]"));
                    } else {
                        row.push_str(&format!(" {c} "));
                    }
                }
                self.panel(&[
                    "Enter the six passcodes".into(),
                    String::new(),
                    row,
                ]);
            }
            Overlay::HintOpen => {
                let hint = engine
                    .level_note()
                    .map(|n| n.hint.clone())
                    .unwrap_or_default();
                let mut lines = vec!["Hint".into(), String::new()];
                lines.extend(wrap(&hint, 44));
                self.panel(&lines);
            }
            Overlay::CompletedPrompt => {
                self.panel(&[
                    "You already escaped this room.".into(),
                    String::new(),
                    "Try again for a better time?".into(),
                    "[Enter] Yes    [Esc] Leave".into(),
                ]);
            }
            Overlay::CompletionSummary => {
                let time = engine.time_remaining();
                self.panel(&[
                    "Room escaped!".into(),
                    String::new(),
                    format!("Time remaining:  {:02}:{:02}", time / 60, time % 60),
                    format!("Points earned:   {}", engine.completion_points()),
                    String::new(),
                    "[Enter] Continue".into(),
                ]);
            }
            Overlay::TimeUpPrompt => {
                self.panel(&[
                    "Time's up!".into(),
                    String::new(),
                    "[Enter] Back to level select".into(),
                ]);
            }
        }
    }

    /// Centered bordered panel over the room view.
    fn panel(&mut self, lines: &[String]) {
        let inner_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(20);
        let w = inner_w + 4;
        let h = lines.len() + 2;
        let x0 = self.front.width.saturating_sub(w) / 2;
        let y0 = self.front.height.saturating_sub(h) / 2;

        for y in 0..h {
            for x in 0..w {
                let ch = match (x, y) {
                    (0, 0) => '┌',
                    (x, 0) if x == w - 1 => '┐',
                    (0, y) if y == h - 1 => '└',
                    (x, y) if x == w - 1 && y == h - 1 => '┘',
                    (_, 0) => '─',
                    (_, y) if y == h - 1 => '─',
                    (0, _) => '│',
                    (x, _) if x == w - 1 => '│',
                    _ => ' ',
                };
                self.front.set(x0 + x, y0 + y, Cell::from_char(ch, Color::White, PANEL_BG));
            }
        }
        for (i, line) in lines.iter().enumerate() {
            self.front.put_str(x0 + 2, y0 + 1 + i, line, Color::White, PANEL_BG);
        }
    }
}

/// Greedy word wrap; long words are hard-split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        for c in word.chars() {
            line.push(c);
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::wrap;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 12);
        assert!(lines.iter().all(|l| l.chars().count() <= 12));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn wrap_splits_overlong_words() {
        let lines = wrap("abcdefghijklmnop", 6);
        assert!(lines.len() >= 2);
        assert!(lines.iter().all(|l| l.chars().count() <= 6));
    }

    #[test]
    fn wrap_of_empty_text_yields_one_blank_line() {
        assert_eq!(wrap("", 10), vec![String::new()]);
    }
}

//! Terminal front-end: one status line, numbered choice lists, raw-mode keys
//!
//! Keys:
//! `space` play/pause, `n` skip, `←`/`→` seek, `a` play again, `r` repeat,
//! `↑`/`↓` or `+`/`-` volume, `m` mute, `l` like, `h` high quality,
//! `R`/`P`/`A` radio/playlist/artist mode, `s` sources, `/` artist search,
//! `<number> Enter` pick a choice, `<number> t` list an album's tracks,
//! `q`/`Esc` quit.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, ClearType, disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, queue, style::Print};
use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use yacatalog::SourceEntry;
use yaplayer::{ArtistQuery, Display, Key, SourceSelection, UiEvent, format_progress};
use yasource::{Mode, SourceSettings, Track};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// What the last numbered list was about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChoiceKind {
    #[default]
    Empty,
    Sources,
    Artists,
    Albums,
    Tracks,
}

impl ChoiceKind {
    fn from_title(title: &str) -> Self {
        match title {
            "Artists" => ChoiceKind::Artists,
            "Albums" => ChoiceKind::Albums,
            "Tracks" => ChoiceKind::Tracks,
            // artist mode lists the albums of the current artist
            t if t.starts_with(Mode::Artist.as_str()) => ChoiceKind::Albums,
            _ => ChoiceKind::Sources,
        }
    }
}

/// Last list shown, shared by the display and the key reader
#[derive(Debug, Default)]
pub struct Choices {
    kind: ChoiceKind,
    entries: Vec<SourceEntry>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn restore() {
    let _ = disable_raw_mode();
    let _ = io::stdout().flush();
}

/// Raw mode for the lifetime of the guard
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("Cannot switch the terminal to raw mode")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore();
        println!();
    }
}

pub struct TerminalDisplay {
    out: Stdout,
    title: String,
    status: String,
    mode: String,
    progress: String,
    volume: f64,
    choices: Arc<Mutex<Choices>>,
}

impl TerminalDisplay {
    pub fn new(choices: Arc<Mutex<Choices>>) -> Self {
        Self {
            out: io::stdout(),
            title: String::new(),
            status: String::new(),
            mode: String::new(),
            progress: format_progress(0.0, 0.0),
            volume: 0.0,
            choices,
        }
    }

    fn line(&self) -> String {
        let mut line = format!(
            "[{}] {} {} vol {:.0}%",
            self.mode,
            self.title,
            self.progress,
            self.volume * 100.0
        );
        if !self.status.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.status);
        }
        line
    }

    fn redraw(&mut self) {
        let line = self.line();
        let result = queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(line)
        )
        .and_then(|_| self.out.flush());
        if let Err(err) = result {
            warn!("Terminal write failed: {}", err);
        }
    }
}

impl Display for TerminalDisplay {
    fn set_title(&mut self, track: &Track) {
        self.title = track.to_string();
        self.redraw();
    }

    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
        self.redraw();
    }

    fn set_mode(&mut self, mode: Mode, source_name: Option<&str>) {
        self.mode = match source_name {
            Some(name) => format!("{}: {}", mode, name),
            None => mode.to_string(),
        };
        self.redraw();
    }

    fn set_progress(&mut self, position: f64, duration: f64) {
        self.progress = format_progress(position, duration);
        self.redraw();
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        self.redraw();
    }

    fn show_choices(&mut self, title: &str, choices: &[SourceEntry]) {
        let mut text = format!("\r\n{}:\r\n", title);
        for (i, entry) in choices.iter().enumerate() {
            text.push_str(&format!("  {:>2}. {}\r\n", i + 1, entry.name));
        }
        if let Err(err) = queue!(self.out, cursor::MoveToColumn(0), Print(text)) {
            warn!("Terminal write failed: {}", err);
        }
        {
            let mut shared = lock(&self.choices);
            shared.kind = ChoiceKind::from_title(title);
            shared.entries = choices.to_vec();
        }
        self.redraw();
    }
}

/// Single-key actions
fn map_key(key: &KeyEvent) -> Option<Key> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(Key::Exit);
    }
    let key = match key.code {
        KeyCode::Char(' ') => Key::PlayPause,
        KeyCode::Char('n') => Key::Skip,
        KeyCode::Right => Key::Forward,
        KeyCode::Left => Key::Back,
        KeyCode::Char('a') => Key::PlayAgain,
        KeyCode::Char('r') => Key::Repeat,
        KeyCode::Up | KeyCode::Char('+') => Key::VolumeUp,
        KeyCode::Down | KeyCode::Char('-') => Key::VolumeDown,
        KeyCode::Char('m') => Key::Mute,
        KeyCode::Char('l') => Key::Like,
        KeyCode::Char('h') => Key::ToggleHighRes,
        KeyCode::Char('R') => Key::ModeRadio,
        KeyCode::Char('P') => Key::ModePlaylist,
        KeyCode::Char('A') => Key::ModeArtist,
        KeyCode::Char('s') => Key::ShowSources,
        KeyCode::Char('q') | KeyCode::Esc => Key::Exit,
        _ => return None,
    };
    Some(key)
}

enum Input {
    Keys,
    Search(String),
    Number(String),
}

/// Turns key presses into player events
pub struct KeyMapper {
    choices: Arc<Mutex<Choices>>,
    input: Input,
    /// Artist whose albums were last requested
    artist_id: Option<String>,
}

impl KeyMapper {
    pub fn new(choices: Arc<Mutex<Choices>>) -> Self {
        Self {
            choices,
            input: Input::Keys,
            artist_id: None,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Option<UiEvent> {
        match std::mem::replace(&mut self.input, Input::Keys) {
            Input::Keys => match key.code {
                KeyCode::Char('/') => {
                    self.input = Input::Search(String::new());
                    Some(UiEvent::Status("Artist: ".to_string()))
                }
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    self.input = Input::Number(c.to_string());
                    None
                }
                _ => map_key(&key).map(UiEvent::KeyPressed),
            },
            Input::Search(mut text) => match key.code {
                KeyCode::Enter if !text.trim().is_empty() => {
                    Some(UiEvent::Query(ArtistQuery::Artists(text.trim().to_string())))
                }
                KeyCode::Enter | KeyCode::Esc => Some(UiEvent::Status(String::new())),
                KeyCode::Backspace => {
                    text.pop();
                    self.search_status(text)
                }
                KeyCode::Char(c) => {
                    text.push(c);
                    self.search_status(text)
                }
                _ => {
                    self.input = Input::Search(text);
                    None
                }
            },
            Input::Number(mut digits) => match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    digits.push(c);
                    self.input = Input::Number(digits);
                    None
                }
                KeyCode::Enter => self.pick(digits.parse().ok()?),
                KeyCode::Char('t') => self.preview(digits.parse().ok()?),
                _ => None,
            },
        }
    }

    fn search_status(&mut self, text: String) -> Option<UiEvent> {
        let status = format!("Artist: {}", text);
        self.input = Input::Search(text);
        Some(UiEvent::Status(status))
    }

    fn chosen(&self, number: usize) -> Option<(ChoiceKind, SourceEntry)> {
        let choices = lock(&self.choices);
        let entry = choices.entries.get(number.checked_sub(1)?)?.clone();
        Some((choices.kind, entry))
    }

    /// `number` is 1-based, as shown
    fn pick(&mut self, number: usize) -> Option<UiEvent> {
        let (kind, entry) = self.chosen(number)?;
        match kind {
            ChoiceKind::Empty => None,
            ChoiceKind::Sources => Some(UiEvent::SourceSettingsUpdated(SourceSelection::new(
                entry.id,
            ))),
            ChoiceKind::Artists => {
                self.artist_id = Some(entry.id.clone());
                Some(UiEvent::Query(ArtistQuery::Albums(entry.id)))
            }
            ChoiceKind::Albums => {
                let artist_id = self.artist_id.clone()?;
                let settings = SourceSettings::Artist {
                    album_ids: vec![entry.id],
                };
                Some(UiEvent::SourceSettingsUpdated(
                    SourceSelection::new(artist_id).with_settings(settings),
                ))
            }
            ChoiceKind::Tracks => Some(UiEvent::SkipToPosition(number - 1)),
        }
    }

    fn preview(&mut self, number: usize) -> Option<UiEvent> {
        match self.chosen(number)? {
            (ChoiceKind::Albums, entry) => Some(UiEvent::Query(ArtistQuery::Tracks(vec![entry.id]))),
            _ => None,
        }
    }
}

/// Blocking key reader thread
pub struct KeyReader {
    stop: Arc<AtomicBool>,
}

impl KeyReader {
    pub fn spawn(events: UnboundedSender<UiEvent>, mut mapper: KeyMapper) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                match event::poll(POLL_INTERVAL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(err) => {
                        warn!("Cannot poll terminal events: {}", err);
                        break;
                    }
                }
                let key = match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                    Ok(_) => continue,
                    Err(err) => {
                        warn!("Cannot read terminal events: {}", err);
                        break;
                    }
                };
                if let Some(event) = mapper.on_key(key) {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
        });
        Self { stop }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(mapper: &mut KeyMapper, text: &str) -> Vec<UiEvent> {
        text.chars()
            .filter_map(|c| mapper.on_key(press(KeyCode::Char(c))))
            .collect()
    }

    fn shared(kind: ChoiceKind, ids: &[&str]) -> Arc<Mutex<Choices>> {
        Arc::new(Mutex::new(Choices {
            kind,
            entries: ids.iter().map(|id| SourceEntry::new(*id, *id)).collect(),
        }))
    }

    #[test]
    fn test_single_keys() {
        let mut mapper = KeyMapper::new(Arc::default());
        assert_eq!(
            mapper.on_key(press(KeyCode::Char(' '))),
            Some(UiEvent::KeyPressed(Key::PlayPause))
        );
        assert_eq!(
            mapper.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(UiEvent::KeyPressed(Key::Exit))
        );
        assert_eq!(
            mapper.on_key(KeyEvent::new(KeyCode::Char('P'), KeyModifiers::SHIFT)),
            Some(UiEvent::KeyPressed(Key::ModePlaylist))
        );
        assert_eq!(mapper.on_key(press(KeyCode::Char('z'))), None);
    }

    #[test]
    fn test_artist_search() {
        let mut mapper = KeyMapper::new(Arc::default());
        type_text(&mut mapper, "/kinx");
        mapper.on_key(press(KeyCode::Backspace));
        assert_eq!(
            mapper.on_key(press(KeyCode::Enter)),
            Some(UiEvent::Query(ArtistQuery::Artists("kin".into())))
        );
        // back to plain keys
        assert_eq!(
            mapper.on_key(press(KeyCode::Char('n'))),
            Some(UiEvent::KeyPressed(Key::Skip))
        );
    }

    #[test]
    fn test_artist_drill_down() {
        let choices = shared(ChoiceKind::Artists, &["7", "42"]);
        let mut mapper = KeyMapper::new(choices.clone());
        type_text(&mut mapper, "2");
        assert_eq!(
            mapper.on_key(press(KeyCode::Enter)),
            Some(UiEvent::Query(ArtistQuery::Albums("42".into())))
        );

        *choices.lock().unwrap() = Choices {
            kind: ChoiceKind::from_title("Albums"),
            entries: vec![SourceEntry::new("a", "Zvezda")],
        };
        type_text(&mut mapper, "1");
        assert_eq!(
            mapper.on_key(press(KeyCode::Char('t'))),
            Some(UiEvent::Query(ArtistQuery::Tracks(vec!["a".into()])))
        );
        type_text(&mut mapper, "1");
        let expected = SourceSelection::new("42").with_settings(SourceSettings::Artist {
            album_ids: vec!["a".into()],
        });
        assert_eq!(
            mapper.on_key(press(KeyCode::Enter)),
            Some(UiEvent::SourceSettingsUpdated(expected))
        );
    }

    #[test]
    fn test_pick_out_of_range() {
        let mut mapper = KeyMapper::new(shared(ChoiceKind::Sources, &["rock"]));
        type_text(&mut mapper, "0");
        assert_eq!(mapper.on_key(press(KeyCode::Enter)), None);
        type_text(&mut mapper, "12");
        assert_eq!(mapper.on_key(press(KeyCode::Enter)), None);
        type_text(&mut mapper, "1");
        assert_eq!(
            mapper.on_key(press(KeyCode::Enter)),
            Some(UiEvent::SourceSettingsUpdated(SourceSelection::new("rock")))
        );
    }

    #[test]
    fn test_choice_kind_from_title() {
        assert_eq!(ChoiceKind::from_title("radio sources"), ChoiceKind::Sources);
        assert_eq!(ChoiceKind::from_title("artist sources"), ChoiceKind::Albums);
        assert_eq!(ChoiceKind::from_title("Tracks"), ChoiceKind::Tracks);
    }
}

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub key: KeyCode,
    pub mods: KeyModifiers,
}

/// Which screen keystrokes are routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Help,
    UploadPrompt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    PauseToggle,
    HudToggle,
    HelpToggle,
    BubblesToggle,
    AddTemplateFish,
    UploadOpen,
    UploadChar(char),
    UploadBackspace,
    UploadCommit,
    UploadCancel,
    Redraw,
    Back,
}

/// Drains pending terminal events without blocking the frame. The second
/// value reports whether the terminal was resized.
pub fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<(Vec<InputEvent>, bool)> {
    let mut out = Vec::new();
    let mut resized = false;

    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
                out.push(InputEvent {
                    key: k.code,
                    mods: k.modifiers,
                });
                if out.len() >= 32 {
                    break;
                }
            }
            Event::Resize(..) => resized = true,
            _ => {}
        }
    }
    Ok((out, resized))
}

pub fn map_event_to_action(mode: Mode, ev: &InputEvent) -> Option<Action> {
    if ev.mods.contains(KeyModifiers::CONTROL) {
        return match ev.key {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('l') => Some(Action::Redraw),
            _ => None,
        };
    }

    match mode {
        Mode::UploadPrompt => match ev.key {
            KeyCode::Enter => Some(Action::UploadCommit),
            KeyCode::Esc => Some(Action::UploadCancel),
            KeyCode::Backspace => Some(Action::UploadBackspace),
            KeyCode::Char(ch) if !ch.is_control() => Some(Action::UploadChar(ch)),
            _ => None,
        },
        Mode::Help => match ev.key {
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter => Some(Action::Back),
            _ => None,
        },
        Mode::Normal => match ev.key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Char(' ') => Some(Action::PauseToggle),
            KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::HudToggle),
            KeyCode::Char('?') => Some(Action::HelpToggle),
            KeyCode::Char('b') | KeyCode::Char('B') => Some(Action::BubblesToggle),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::AddTemplateFish),
            KeyCode::Char('u') | KeyCode::Char('U') => Some(Action::UploadOpen),
            _ => None,
        },
    }
}

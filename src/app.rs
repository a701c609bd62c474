use crate::assets::{AssetLoader, AssetPaths};
use crate::background::BackgroundPath;
use crate::broadcast::{BroadcastChannel, Delivery};
use crate::cli::Cli;
use crate::config::{load_settings, project_paths, save_settings_atomic, Paths, Settings};
use crate::input::{collect_input_nonblocking, map_event_to_action, Action, Mode};
use crate::logging::init_tracing;
use crate::render::{draw_text, surface_to_cells, Backend, Cell, CleanupGuard, Terminal};
use crate::scene::{AddFish, Aquarium, SceneState};
use crate::sprite::Sprite;
use crate::upload::{describe, load_upload, submit};
use crossterm::style::Color;
use std::cmp::min;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

const CHANNEL_POLL_FRAMES: u64 = 15;
const STATUS_SECS: u64 = 4;
const NOTICE_SECS: u64 = 8;
const PROMPT_MAX: usize = 200;

const HUD_FG: Color = Color::White;
const HUD_BG: Color = Color::Black;

struct Status {
    text: String,
    until: Instant,
}

pub struct App {
    /// Settings as stored on disk; command-line overrides are not persisted.
    stored: Settings,
    settings: Settings,
    paths: Paths,
    backend: Backend,
    term: Terminal,
    scene: Aquarium,
    loader: Option<AssetLoader>,
    channel: Option<BroadcastChannel>,
    mode: Mode,
    prompt: String,
    status: Option<Status>,
    notice: Option<Status>,
    show_hud: bool,
    paused: bool,
    should_quit: bool,
    started: Instant,
    frames: u64,
    fps: f32,
}

impl App {
    fn init(cli: Cli) -> anyhow::Result<Self> {
        let paths = project_paths()?;
        // Logging is best effort; a read-only data dir shouldn't stop the show.
        let log_ready = init_tracing(&paths.log_path).is_ok();

        let stored = load_settings(&paths.settings_path);
        let mut settings = stored.clone();
        cli.apply(&mut settings);
        if settings.seed == 0 {
            settings.seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0xC0FFEE);
        }

        let mut backend = Backend::detect(settings.enable_color);
        if !settings.enable_shader {
            backend.shading = false;
        }
        tracing::info!(?backend, seed = settings.seed, log_ready, "starting");

        let term = Terminal::begin()?;
        let (w, h) = term.viewport();
        let mut scene = Aquarium::new(w, h, settings.scene.clone(), settings.seed);

        let asset_paths = AssetPaths::resolve(cli.assets.as_deref(), settings.asset_dir.as_deref());
        let loader = AssetLoader::spawn(asset_paths, settings.seed as u32)?;

        let mut status = None;
        let channel = match BroadcastChannel::open(&paths.channels_dir, &settings.channel) {
            Ok(ch) => Some(ch),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "channel unavailable");
                status = Some(Status {
                    text: format!("Channel unavailable: {err}"),
                    until: Instant::now() + Duration::from_secs(STATUS_SECS),
                });
                None
            }
        };

        let mut last = None;
        for path in &cli.fish {
            last = Some(match load_upload(path) {
                Ok(upload) => describe(submit(&mut scene, upload)),
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "fish skipped");
                    format!("Could not load {}: {err}", path.display())
                }
            });
        }
        if let Some(text) = last {
            status = Some(Status {
                text,
                until: Instant::now() + Duration::from_secs(STATUS_SECS),
            });
        }

        let notice = backend.notice().map(|text| Status {
            text: text.to_string(),
            until: Instant::now() + Duration::from_secs(NOTICE_SECS),
        });

        Ok(Self {
            stored,
            settings,
            paths,
            backend,
            term,
            scene,
            loader: Some(loader),
            channel,
            mode: Mode::Normal,
            prompt: String::new(),
            status,
            notice,
            show_hud: true,
            paused: false,
            should_quit: false,
            started: Instant::now(),
            frames: 0,
            fps: 0.0,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
        let mut fps_window = (Instant::now(), 0u32);

        while !self.should_quit {
            let frame_start = Instant::now();

            let (events, resized) = collect_input_nonblocking(frame_dt)?;
            if self.term.resize_if_needed()? || resized {
                let (w, h) = self.term.viewport();
                self.scene.handle_viewport_resize(w, h);
            }
            for ev in events {
                if self.notice.is_some() {
                    self.notice = None;
                }
                if let Some(action) = map_event_to_action(self.mode, &ev) {
                    self.apply(action);
                }
                if self.should_quit {
                    break;
                }
            }

            if let Some(loader) = self.loader.as_mut() {
                if let Some(assets) = loader.poll() {
                    if !assets.substituted.is_empty() {
                        self.set_status(format!(
                            "Using built-in art for: {}",
                            assets.substituted.join(", ")
                        ));
                    }
                    self.scene.finish_loading(assets, self.backend.shading);
                    self.loader = None;
                }
            }

            if self.frames % CHANNEL_POLL_FRAMES == 0 {
                self.poll_channel();
            }

            self.render_frame()?;

            self.frames += 1;
            fps_window.1 += 1;
            let span = fps_window.0.elapsed();
            if span >= Duration::from_millis(500) {
                self.fps = fps_window.1 as f32 / span.as_secs_f32();
                fps_window = (Instant::now(), 0);
            }

            spin_sleep(frame_dt, frame_start);
        }

        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.stored)?;
        tracing::info!(fish = self.scene.fish_count(), "exiting");
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::PauseToggle => self.paused = !self.paused,
            Action::HudToggle => self.show_hud = !self.show_hud,
            Action::HelpToggle => self.mode = Mode::Help,
            Action::Back => self.mode = Mode::Normal,
            Action::Redraw => self.term.force_redraw(),
            Action::BubblesToggle => {
                let on = !self.scene.bubbles_enabled();
                self.scene.set_bubbles_enabled(on);
                self.set_status(format!("Bubbles {}", if on { "on" } else { "off" }));
            }
            Action::AddTemplateFish => match self.scene.add_template_fish() {
                Some(outcome) => self.set_status(describe(outcome)),
                None => self.set_status("Still loading...".to_string()),
            },
            Action::UploadOpen => {
                self.prompt.clear();
                self.mode = Mode::UploadPrompt;
            }
            Action::UploadChar(ch) => {
                if self.prompt.chars().count() < PROMPT_MAX {
                    self.prompt.push(ch);
                }
            }
            Action::UploadBackspace => {
                self.prompt.pop();
            }
            Action::UploadCancel => self.mode = Mode::Normal,
            Action::UploadCommit => {
                self.mode = Mode::Normal;
                let raw = self.prompt.trim().trim_matches(|c| c == '"' || c == '\'');
                if raw.is_empty() {
                    return;
                }
                let path = expand_home(raw);
                let text = match load_upload(&path) {
                    Ok(upload) => describe(submit(&mut self.scene, upload)),
                    Err(err) => {
                        tracing::warn!(error = %format!("{err:#}"), "upload rejected");
                        format!("Could not load {}: {err}", path.display())
                    }
                };
                self.set_status(text);
            }
        }
    }

    fn poll_channel(&mut self) {
        let Some(channel) = &self.channel else {
            return;
        };
        for delivery in channel.drain() {
            match delivery {
                Delivery::NewFish(bytes) => {
                    let text = match Sprite::decode(&bytes) {
                        Ok(sprite) => match self.scene.add_fish(Rc::new(sprite), None) {
                            AddFish::Added { count } => format!("A fish arrived: {count} fish swimming"),
                            full => describe(full),
                        },
                        Err(err) => {
                            tracing::warn!(error = %format!("{err:#}"), "undecodable fish payload");
                            "A fish arrived but could not be decoded".to_string()
                        }
                    };
                    self.set_status(text);
                }
            }
        }
    }

    fn set_status(&mut self, text: String) {
        self.status = Some(Status {
            text,
            until: Instant::now() + Duration::from_secs(STATUS_SECS),
        });
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let time = self.started.elapsed().as_secs_f32();
        if self.paused {
            self.scene.redraw(&mut self.term.surface, time);
        } else {
            self.scene.tick(&mut self.term.surface, time);
        }
        surface_to_cells(&self.term.surface, &mut self.term.cur, self.backend.color);

        let now = Instant::now();
        if self.status.as_ref().is_some_and(|s| now >= s.until) {
            self.status = None;
        }
        if self.notice.as_ref().is_some_and(|s| now >= s.until) {
            self.notice = None;
        }

        if self.scene.state() == SceneState::Loading {
            let msg = "Loading the aquarium...";
            let x = self.term.cols.saturating_sub(msg.len() as u16) / 2;
            draw_text(&mut self.term.cur, x, self.term.rows / 2, msg, HUD_FG, HUD_BG);
        }

        if self.show_hud {
            self.draw_hud();
        }

        if let Some(notice) = &self.notice {
            let y = self.term.rows.saturating_sub(1);
            let text = format!(" {} (any key) ", notice.text);
            draw_text(&mut self.term.cur, 0, y, &text, Color::Black, Color::Yellow);
        }

        let mode = self.mode;
        match mode {
            Mode::Help => self.draw_center_box(
                "Aquarium",
                "Fish swim in straight lines and turn at the glass.\n\
                 Bubbles rise, coral sways.\n\n\
                 +  Add a fish from the template\n\
                 U  Add a fish from an image file\n\
                 B  Bubbles on/off\n\
                 P  Pause\n\
                 H  HUD on/off\n\
                 Q  Quit\n\n\
                 Send fish from another terminal:\n\
                 aquarium-upload IMAGE --channel NAME\n\n\
                 Esc or ? to close.",
            ),
            Mode::UploadPrompt => {
                let mut preview = self.prompt.clone();
                preview.push('_');
                let body = format!(
                    "Path to a PNG/JPEG/GIF fish image.\n\
                     A .json next to it adds tail/fin motion.\n\n\
                     {}\n\n\
                     Enter add | Esc cancel",
                    tail_chars(&preview, 54)
                );
                self.draw_center_box("Upload a fish", &body);
            }
            Mode::Normal => {}
        }

        self.term.present()
    }

    fn draw_hud(&mut self) {
        let backdrop = match self.scene.background_path() {
            BackgroundPath::Shaded => "ripple",
            BackgroundPath::Fallback => "plain",
        };
        let line = format!(
            " {} fish | bubbles {} | water {} | {:.0} fps{} | ? help ",
            self.scene.fish_count(),
            if self.scene.bubbles_enabled() { "on" } else { "off" },
            backdrop,
            self.fps,
            if self.paused { " | paused" } else { "" },
        );
        draw_text(&mut self.term.cur, 0, 0, &line, HUD_FG, HUD_BG);
        if let Some(status) = &self.status {
            let text = format!(" {} ", status.text);
            draw_text(&mut self.term.cur, 0, 1, &text, Color::Black, Color::Cyan);
        }
    }

    fn draw_center_box(&mut self, title: &str, body: &str) {
        let w = self.term.cols;
        let h = self.term.rows;
        if w < 8 || h < 6 {
            return;
        }

        let bw = min(60, w.saturating_sub(4));
        let bh = min(20, h.saturating_sub(2));
        let x0 = (w - bw) / 2;
        let y0 = (h - bh) / 2;

        let cell = |ch| Cell {
            ch,
            fg: HUD_FG,
            bg: HUD_BG,
        };
        for y in y0..y0 + bh {
            for x in x0..x0 + bw {
                self.term.cur.set(x, y, cell(' '));
            }
        }
        for x in x0..x0 + bw {
            self.term.cur.set(x, y0, cell('─'));
            self.term.cur.set(x, y0 + bh - 1, cell('─'));
        }
        for y in y0..y0 + bh {
            self.term.cur.set(x0, y, cell('│'));
            self.term.cur.set(x0 + bw - 1, y, cell('│'));
        }
        self.term.cur.set(x0, y0, cell('┌'));
        self.term.cur.set(x0 + bw - 1, y0, cell('┐'));
        self.term.cur.set(x0, y0 + bh - 1, cell('└'));
        self.term.cur.set(x0 + bw - 1, y0 + bh - 1, cell('┘'));

        draw_text(&mut self.term.cur, x0 + 2, y0 + 1, title, HUD_FG, HUD_BG);
        let mut yy = y0 + 3;
        for line in body.lines() {
            if yy >= y0 + bh - 1 {
                break;
            }
            let line = tail_chars(line.trim_start(), bw.saturating_sub(4) as usize);
            draw_text(&mut self.term.cur, x0 + 2, yy, &line, HUD_FG, HUD_BG);
            yy += 1;
        }
    }
}

/// Last `n` characters, so the cursor end of a long path stays visible.
fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new() {
            return home.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let _guard = CleanupGuard;
    let mut app = App::init(cli)?;
    app.run()
}

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
    }

    #[test]
    fn home_is_expanded_only_for_tilde_paths() {
        assert_eq!(expand_home("/tmp/fish.png"), PathBuf::from("/tmp/fish.png"));
        if let Some(home) = directories::BaseDirs::new() {
            assert_eq!(expand_home("~/fish.png"), home.home_dir().join("fish.png"));
        }
    }
}

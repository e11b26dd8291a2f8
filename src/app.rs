//! Application event loop wiring the composer, controller, and store.

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
};
use std::fs;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::api::HttpTransport;
use crate::config::Config;
use crate::controller::{SendController, TurnEvent};
use crate::identity;
use crate::store::{ConversationStore, Role};
use crate::ui::{Composer, ComposerResult, HistoryView, ParsedCommand, SlashCommand, get_help_text};

/// Launch the chat TUI and run it until the user quits.
pub async fn run(config: Config) -> Result<()> {
    let client_id = identity::load_or_create(&config.parley_home)?;
    info!(client_id, base_url = %config.base_url, "starting chat session");

    let transport = HttpTransport::new(&config, client_id.clone());
    let controller = SendController::new(
        transport,
        client_id.clone(),
        config.language.clone(),
        Duration::from_millis(config.soft_retry_delay_ms),
        Duration::from_millis(config.requery_delay_ms),
    );

    let (turn_tx, turn_rx) = mpsc::unbounded_channel();
    let mut app = App {
        store: ConversationStore::new(),
        composer: Composer::new("Ask me anything..."),
        controller,
        turn_tx,
        turn_rx,
        busy: false,
        should_quit: false,
        client_id,
        transcripts_dir: config.transcripts_dir(),
        show_timestamps: config.ui.show_timestamps,
    };

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = app.event_loop(&mut terminal).await;

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

struct App {
    store: ConversationStore,
    composer: Composer,
    controller: SendController<HttpTransport>,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
    turn_rx: mpsc::UnboundedReceiver<TurnEvent>,
    busy: bool,
    should_quit: bool,
    client_id: String,
    transcripts_dir: PathBuf,
    show_timestamps: bool,
}

impl App {
    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        loop {
            self.drain_turn_events();

            terminal
                .draw(|frame| self.draw(frame))
                .context("Failed to draw frame")?;

            if self.should_quit {
                return Ok(());
            }

            // Short poll keeps the thinking indicator animating while idle
            if event::poll(Duration::from_millis(50)).context("Failed to poll events")? {
                if let Event::Key(key) = event::read().context("Failed to read event")? {
                    self.handle_key(key);
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(3)])
            .split(frame.size());

        frame.render_widget(
            HistoryView::new(&self.store, self.busy, self.show_timestamps),
            chunks[0],
        );
        frame.render_widget(&self.composer, chunks[1]);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => self.start_turn(text),
            ComposerResult::Command(command) => self.run_command(command),
            ComposerResult::None => {}
        }
    }

    /// Kick off a logical turn. The composer is already cleared, and stays
    /// disabled until the controller reports the turn finished.
    fn start_turn(&mut self, text: String) {
        let controller = self.controller.clone();
        let events = self.turn_tx.clone();
        tokio::spawn(async move {
            controller.run_turn(&text, &events).await;
        });
    }

    /// Apply controller output to the store, strictly in channel order.
    fn drain_turn_events(&mut self) {
        while let Ok(event) = self.turn_rx.try_recv() {
            match event {
                TurnEvent::UserMessage(text) => {
                    self.store.append(Role::User, text);
                }
                TurnEvent::AssistantMessage(text) => {
                    self.store.append(Role::Assistant, text);
                }
                TurnEvent::Busy(busy) => {
                    self.busy = busy;
                    self.composer.set_disabled(busy);
                }
            }
        }
    }

    fn run_command(&mut self, command: ParsedCommand) {
        match command.command {
            SlashCommand::Help => {
                self.store.append(Role::Assistant, get_help_text());
            }
            SlashCommand::Id => {
                self.store
                    .append(Role::Assistant, format!("Client id: {}", self.client_id));
            }
            SlashCommand::Save => {
                let note = match self.save_transcript(command.argument()) {
                    Ok(path) => format!("Transcript saved to {}", path.display()),
                    Err(err) => {
                        warn!(error = %err, "transcript save failed");
                        format!("Could not save transcript: {}", err)
                    }
                };
                self.store.append(Role::Assistant, note);
            }
            SlashCommand::Quit => {
                self.should_quit = true;
            }
        }
    }

    fn save_transcript(&self, path: Option<&str>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => PathBuf::from(path),
            None => {
                fs::create_dir_all(&self.transcripts_dir)
                    .context("Failed to create transcripts directory")?;
                let name = chrono::Local::now()
                    .format("transcript-%Y%m%d-%H%M%S.html")
                    .to_string();
                self.transcripts_dir.join(name)
            }
        };

        fs::write(&path, self.store.to_html()).context("Failed to write transcript")?;
        Ok(path)
    }
}

//! Terminal application: wires the chat controller into a ratatui loop.

use crate::controller::{ChatController, ConversationSnapshot};
use crate::ui::{Composer, ComposerResult, Transcript};
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use std::io::{self, Stdout};
use std::sync::Arc;
use tokio::sync::watch;

type Tui = Terminal<CrosstermBackend<Stdout>>;

pub struct App {
    controller: Arc<ChatController>,
    composer: Composer,
    snapshots: watch::Receiver<ConversationSnapshot>,
    should_quit: bool,
}

/// Run the chat UI until the user quits.
pub async fn run(controller: Arc<ChatController>) -> Result<()> {
    install_panic_hook();
    let mut terminal = init()?;
    let result = App::new(controller).main_loop(&mut terminal).await;
    restore()?;
    result
}

impl App {
    fn new(controller: Arc<ChatController>) -> Self {
        let snapshots = controller.subscribe();
        Self {
            controller,
            composer: Composer::default(),
            snapshots,
            should_quit: false,
        }
    }

    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        let mut events = EventStream::new();

        while !self.should_quit {
            self.composer.set_disabled(self.controller.input_disabled());
            let snapshot = self.controller.snapshot();
            terminal.draw(|frame| self.draw(frame, &snapshot))?;

            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                },
                // A new snapshot was published; loop around and redraw.
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_quit = true,
                KeyCode::Char('n') => self.controller.reset(),
                KeyCode::Char('e') => self.controller.load_example(),
                KeyCode::Char('t') => {
                    self.controller.toggle_streaming();
                }
                _ => {}
            }
            return;
        }

        if key.code == KeyCode::Esc {
            self.should_quit = true;
            return;
        }

        if let ComposerResult::Submitted(prompt) = self.composer.handle_key(key) {
            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move { controller.submit(&prompt).await });
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame, snapshot: &ConversationSnapshot) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(frame.size());

        let streaming = if self.controller.streaming() {
            Span::styled("streaming", Style::default().fg(Color::Green))
        } else {
            Span::styled("complete", Style::default().fg(Color::Yellow))
        };
        let header = Paragraph::new(vec![
            Line::from(vec![
                Span::styled("bedrock-chat ", Style::default().fg(Color::Cyan)),
                Span::raw(self.controller.model_id()),
                Span::raw("  ·  "),
                streaming,
            ]),
            Line::from(Span::styled(
                "Enter send · ^N new conversation · ^E example · ^T streaming · Esc quit",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(header, chunks[0]);

        frame.render_widget(Transcript::new(snapshot), chunks[1]);
        frame.render_widget(&self.composer, chunks[2]);
    }
}

fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    Ok(terminal)
}

fn restore() -> Result<()> {
    execute!(io::stdout(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Restore the terminal before the default panic output runs.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

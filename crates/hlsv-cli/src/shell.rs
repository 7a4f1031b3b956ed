//! Terminal loop: key bindings, command dispatch and redraw.
//!
//! One command runs to completion before the next key is read. While a
//! command is fetching, the event stream is still polled so a quit key can
//! cancel the in-flight request.

use std::future::Future;
use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, DisableLineWrap, EnableLineWrap,
    EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use futures_util::StreamExt;
use hlsv::{CancellationToken, FetchSource, Highlighter, HlsvResult, Navigator, Outcome};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    SelectNext,
    SelectPrev,
    Back,
    Advance,
    Refresh,
}

fn command_for(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(Command::Quit),
        KeyCode::Char('o') if ctrl => Some(Command::Back),
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(Command::SelectPrev),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::SelectNext),
        KeyCode::Backspace => Some(Command::Back),
        KeyCode::Char('u') => Some(Command::Refresh),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Command::Advance),
        _ => None,
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, DisableLineWrap, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// First visible line so that `selected` sits mid-screen when possible.
fn scroll_offset(selected: Option<usize>, total: usize, height: usize) -> usize {
    let Some(line) = selected else {
        return 0;
    };
    if height == 0 || total <= height {
        return 0;
    }
    line.saturating_sub(height / 2).min(total - height)
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

struct Shell<S> {
    navigator: Navigator<S>,
    highlighter: Box<dyn Highlighter>,
    cancel: CancellationToken,
    error: Option<String>,
}

impl<S: FetchSource> Shell<S> {
    fn status_line(&self) -> String {
        let frame = self.navigator.current_frame();
        let node = frame.node();
        let url = node
            .url()
            .unwrap_or_else(|_| node.relative_url().to_string());
        let selection = if frame.children().is_empty() {
            "-/0".to_string()
        } else {
            format!("{}/{}", frame.selected() + 1, frame.children().len())
        };

        let mut line = format!(
            "[{}] {} | {} | {}",
            self.navigator.depth(),
            url,
            selection,
            node.label()
        );
        if let Some(error) = &self.error {
            line.push_str(" | error: ");
            line.push_str(error);
        }
        line
    }

    fn draw(&self) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        let view = self.navigator.current_view(self.highlighter.as_ref());
        let body_rows = usize::from(rows.saturating_sub(1));
        let lines: Vec<&str> = view.text.lines().collect();
        let first = scroll_offset(view.line, lines.len(), body_rows);

        let mut out = io::stdout().lock();
        queue!(out, Clear(ClearType::All))?;
        for (row, line) in lines.iter().skip(first).take(body_rows).enumerate() {
            queue!(out, MoveTo(0, row as u16), Print(line))?;
        }
        queue!(
            out,
            MoveTo(0, rows.saturating_sub(1)),
            Print(truncate(&self.status_line(), usize::from(cols)))
        )?;
        out.flush()
    }

    /// Run a fetching command while still watching for a quit key.
    /// Returns the command's result and whether quit was requested.
    async fn watch_quit<F>(
        fut: F,
        events: &mut EventStream,
        cancel: &CancellationToken,
    ) -> io::Result<(HlsvResult<Outcome>, bool)>
    where
        F: Future<Output = HlsvResult<Outcome>>,
    {
        let mut fut = std::pin::pin!(fut);
        let mut quit = false;
        loop {
            tokio::select! {
                res = &mut fut => return Ok((res, quit)),
                Some(event) = events.next(), if !quit => {
                    if let Event::Key(key) = event? {
                        if command_for(key) == Some(Command::Quit) {
                            debug!("quit requested while fetching");
                            cancel.cancel();
                            quit = true;
                        }
                    }
                }
            }
        }
    }

    /// Execute one command. Returns `false` when the session should end.
    async fn execute(&mut self, command: Command, events: &mut EventStream) -> io::Result<bool> {
        let cancel = self.cancel.clone();
        let (result, quit) = match command {
            Command::Quit => {
                cancel.cancel();
                return Ok(false);
            }
            Command::SelectNext => (Ok(self.navigator.select_next()), false),
            Command::SelectPrev => (Ok(self.navigator.select_prev()), false),
            Command::Back => (Ok(self.navigator.back()), false),
            Command::Advance => {
                Self::watch_quit(self.navigator.advance(&cancel), events, &cancel).await?
            }
            Command::Refresh => {
                Self::watch_quit(self.navigator.refresh_current(&cancel), events, &cancel).await?
            }
        };

        match result {
            Ok(outcome) => {
                debug!(?command, ?outcome, depth = self.navigator.depth(), "command done");
                self.error = None;
            }
            Err(e) => {
                debug!(?command, "command failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
        Ok(!quit)
    }
}

pub(crate) async fn run<S: FetchSource>(
    navigator: Navigator<S>,
    highlighter: Box<dyn Highlighter>,
    cancel: CancellationToken,
) -> io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut events = EventStream::new();
    let mut shell = Shell {
        navigator,
        highlighter,
        cancel,
        error: None,
    };

    shell.draw()?;
    while let Some(event) = events.next().await {
        let command = match event? {
            Event::Key(key) => command_for(key),
            Event::Resize(..) => {
                shell.draw()?;
                continue;
            }
            _ => None,
        };
        let Some(command) = command else {
            continue;
        };
        if !shell.execute(command, &mut events).await? {
            break;
        }
        shell.draw()?;
    }
    Ok(())
}

use crate::ports::{NotificationBackend, PushChannel, TimeProvider};
use crate::store::StoreState;
use crate::surface::{NotificationSurface, Point};
use crate::types::NotificationId;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::warn;

pub const HELP: &str = "commands: t toggle | r <id> mark read | a mark all read | c click outside | d dismiss | q quit";

/// Pointer position used for the terminal's "click outside" command.
const OUTSIDE: Point = Point { x: -1, y: -1 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Toggle,
    MarkRead(NotificationId),
    MarkAll,
    ClickOutside,
    Dismiss,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(command) => command.to_ascii_lowercase(),
        None => return Err("empty command".to_string()),
    };
    let parsed = match command.as_str() {
        "t" | "toggle" => ConsoleCommand::Toggle,
        "a" | "all" => ConsoleCommand::MarkAll,
        "c" | "click" => ConsoleCommand::ClickOutside,
        "d" | "dismiss" => ConsoleCommand::Dismiss,
        "h" | "help" | "?" => ConsoleCommand::Help,
        "q" | "quit" | "exit" => ConsoleCommand::Quit,
        "r" | "read" => {
            let raw = words.next().ok_or("usage: r <id>")?;
            let id = raw
                .parse::<NotificationId>()
                .map_err(|_| format!("invalid notification id '{raw}'"))?;
            ConsoleCommand::MarkRead(id)
        }
        other => return Err(format!("unknown command '{other}'")),
    };
    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument '{extra}'"));
    }
    Ok(parsed)
}

/// Re-renders on every store change and feeds input lines to the surface
/// until `q` or end of input.
pub async fn run_console<B, C, T, R, W>(
    surface: &mut NotificationSurface<B, C, T>,
    mut changes: watch::Receiver<StoreState>,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    B: NotificationBackend,
    C: PushChannel,
    T: TimeProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut store_alive = true;
    draw(surface, &mut output, None).await?;

    loop {
        tokio::select! {
            changed = changes.changed(), if store_alive => {
                if changed.is_err() {
                    store_alive = false;
                    continue;
                }
                draw(surface, &mut output, None).await?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let note = match parse_command(&line) {
                    Ok(ConsoleCommand::Quit) => return Ok(()),
                    Ok(ConsoleCommand::Help) => Some(HELP.to_string()),
                    Ok(command) => {
                        apply_command(surface, command).await;
                        None
                    }
                    Err(err) => Some(err),
                };
                // This redraw already shows any pending store change.
                changes.mark_unchanged();
                draw(surface, &mut output, note.as_deref()).await?;
            }
        }
    }
}

async fn apply_command<B, C, T>(surface: &mut NotificationSurface<B, C, T>, command: ConsoleCommand)
where
    B: NotificationBackend,
    C: PushChannel,
    T: TimeProvider,
{
    match command {
        ConsoleCommand::Toggle => surface.toggle(),
        ConsoleCommand::MarkRead(id) => surface.mark_read(id).await,
        ConsoleCommand::MarkAll => surface.mark_all_read().await,
        ConsoleCommand::ClickOutside => {
            surface.pointer_down(OUTSIDE);
        }
        ConsoleCommand::Dismiss => surface.dismiss_banner(),
        ConsoleCommand::Help | ConsoleCommand::Quit => {}
    }
}

async fn draw<B, C, T, W>(
    surface: &NotificationSurface<B, C, T>,
    output: &mut W,
    note: Option<&str>,
) -> std::io::Result<()>
where
    B: NotificationBackend,
    C: PushChannel,
    T: TimeProvider,
    W: AsyncWrite + Unpin,
{
    let rendered = match surface.render() {
        Ok(rendered) => rendered,
        Err(err) => {
            warn!(error = %err, "failed to render notification panel");
            return Ok(());
        }
    };
    output.write_all(rendered.as_bytes()).await?;
    output.write_all(b"\n").await?;
    if let Some(note) = note {
        output.write_all(note.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.write_all(b"\n").await?;
    output.flush().await
}

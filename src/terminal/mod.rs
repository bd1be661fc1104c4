//! Local terminal handling
//!
//! Raw mode with guaranteed restoration, window size queries and resize
//! notifications. The [`bridge`] submodule ties these together with a remote
//! session.

use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub mod bridge;

pub use bridge::{BridgeEnd, RemoteInput, RemoteOutput, RemoteTerminal, TerminalBridge, WriterInput};

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Operations on the controlling terminal
pub trait TerminalControl: Send + Sync {
    fn enable_raw_mode(&self) -> io::Result<()>;

    fn disable_raw_mode(&self) -> io::Result<()>;

    fn size(&self) -> io::Result<WindowSize>;

    /// Current size, or 80x24 when it cannot be determined
    fn size_or_default(&self) -> WindowSize {
        self.size().unwrap_or_else(|e| {
            debug!("terminal size unavailable ({}), using 80x24", e);
            WindowSize::default()
        })
    }
}

/// The process's terminal, driven through crossterm
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTerminal;

impl TerminalControl for LocalTerminal {
    fn enable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }

    fn size(&self) -> io::Result<WindowSize> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(WindowSize { cols, rows })
    }
}

/// RAII guard for raw mode
///
/// Leaves raw mode when dropped, so every return path (including `?` and
/// unwinding) restores the terminal.
pub struct RawModeGuard<'a, T: TerminalControl + ?Sized> {
    terminal: &'a T,
}

impl<'a, T: TerminalControl + ?Sized> RawModeGuard<'a, T> {
    /// Enter raw mode
    pub fn enter(terminal: &'a T) -> io::Result<Self> {
        terminal.enable_raw_mode()?;
        Ok(Self { terminal })
    }
}

impl<T: TerminalControl + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Stream of terminal resize notifications
///
/// Each notification only says "the size changed"; the new size is queried
/// from the terminal when it is handled. The background watcher is stopped
/// when this is dropped.
pub struct ResizeNotifier {
    rx: mpsc::Receiver<()>,
    watcher: Option<JoinHandle<()>>,
}

impl ResizeNotifier {
    /// Watch SIGWINCH
    #[cfg(unix)]
    pub fn spawn() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigwinch = signal(SignalKind::window_change())?;
        let (tx, rx) = mpsc::channel(1);

        let watcher = tokio::spawn(async move {
            while sigwinch.recv().await.is_some() {
                // Coalesce: one pending notification is enough
                match tx.try_send(()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
        });

        Ok(Self {
            rx,
            watcher: Some(watcher),
        })
    }

    /// No resize notifications on this platform
    #[cfg(not(unix))]
    pub fn spawn() -> io::Result<Self> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(Self { rx, watcher: None })
    }

    /// Notifier fed by hand
    pub fn channel() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx, watcher: None })
    }

    /// Wait for the next notification; `None` once the source is gone
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl Drop for ResizeNotifier {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Resolves when the process is asked to terminate (SIGTERM or SIGHUP)
///
/// In raw mode Ctrl+C is a byte for the remote side, not a signal, so it is
/// not watched here.
pub async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(mut sigterm), Ok(mut sighup)) => {
                tokio::select! {
                    _ = sigterm.recv() => debug!("Received SIGTERM"),
                    _ = sighup.recv() => debug!("Received SIGHUP"),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to register termination handlers: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockTerminal;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_raw_mode_guard_restores_on_drop() {
        let terminal = MockTerminal::default();
        {
            let _guard = RawModeGuard::enter(&terminal).unwrap();
            assert!(terminal.is_raw());
        }
        assert!(!terminal.is_raw());
        assert_eq!(terminal.enabled.load(Ordering::SeqCst), 1);
        assert_eq!(terminal.disabled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_raw_mode_guard_enter_failure() {
        let terminal = MockTerminal {
            fail_enable: true,
            ..Default::default()
        };
        assert!(RawModeGuard::enter(&terminal).is_err());
        // Nothing to restore when raw mode was never entered
        assert_eq!(terminal.disabled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_size_or_default() {
        let terminal = MockTerminal::default();
        assert_eq!(terminal.size_or_default(), WindowSize::new(80, 24));

        terminal.set_size(Some(WindowSize::new(132, 50)));
        assert_eq!(terminal.size_or_default(), WindowSize::new(132, 50));
    }

    #[tokio::test]
    async fn test_resize_notifier_channel() {
        let (tx, mut notifier) = ResizeNotifier::channel();
        tx.send(()).await.unwrap();
        assert_eq!(notifier.recv().await, Some(()));

        drop(tx);
        assert_eq!(notifier.recv().await, None);
    }
}

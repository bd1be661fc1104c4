//! Terminal bridge
//!
//! Relays an interactive session between the local terminal and a remote
//! shell:
//!
//! - local input is copied to the remote side by its own task,
//! - remote output is copied to local output,
//! - resize notifications are forwarded as window-change requests.
//!
//! The first relay to finish ends the session. Raw mode is held for the
//! whole run and restored on every exit path.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{RawModeGuard, ResizeNotifier, TerminalControl, WindowSize};
use crate::error::Result;

const RELAY_BUFFER_SIZE: usize = 4096;

/// Output produced by the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutput {
    /// Bytes for the local terminal
    Data(Vec<u8>),
    /// The remote side closed the session
    Closed,
}

/// Reading half of a remote interactive session
#[async_trait]
pub trait RemoteTerminal: Send {
    /// Wait for the next output
    ///
    /// Must be cancel safe: it is raced against input and resize events.
    async fn next_output(&mut self) -> Result<RemoteOutput>;

    /// Tell the remote side the terminal size changed
    async fn resize(&mut self, size: WindowSize) -> Result<()>;
}

/// Writing half of a remote interactive session
#[async_trait]
pub trait RemoteInput: Send + 'static {
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Local input reached end of file
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// [`RemoteInput`] over any async writer
pub struct WriterInput<W> {
    writer: Pin<Box<W>>,
}

impl<W: AsyncWrite + Send + 'static> WriterInput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Box::pin(writer),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + 'static> RemoteInput for WriterInput<W> {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Why a bridged session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// Remote output ended (close, EOF or read error)
    RemoteClosed,
    /// Local input ended (EOF or remote write error)
    InputClosed,
    /// Local output could not be written
    OutputClosed,
    /// The process received a termination signal
    Terminated,
}

/// Interactive session relay between the local terminal and a remote shell
pub struct TerminalBridge<'t, T: TerminalControl + ?Sized> {
    terminal: &'t T,
    resize: ResizeNotifier,
}

impl<'t, T: TerminalControl + ?Sized> TerminalBridge<'t, T> {
    pub fn new(terminal: &'t T, resize: ResizeNotifier) -> Self {
        Self { terminal, resize }
    }

    /// Run until either relay ends or `shutdown` resolves
    ///
    /// Relay I/O errors end the session normally; only failing to enter raw
    /// mode is an error.
    pub async fn run<R, W, I, M, F>(
        self,
        local_in: R,
        mut local_out: W,
        input: I,
        remote: &mut M,
        shutdown: F,
    ) -> Result<BridgeEnd>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
        I: RemoteInput,
        M: RemoteTerminal + ?Sized,
        F: Future<Output = ()>,
    {
        let Self {
            terminal,
            mut resize,
        } = self;

        let _raw_mode = RawModeGuard::enter(terminal)?;

        let mut input_task = tokio::spawn(relay_input(local_in, input));
        let mut resize_open = true;
        tokio::pin!(shutdown);

        let end = loop {
            tokio::select! {
                output = remote.next_output() => match output {
                    Ok(RemoteOutput::Data(data)) => {
                        if let Err(e) = write_local(&mut local_out, &data).await {
                            debug!("local output closed: {}", e);
                            break BridgeEnd::OutputClosed;
                        }
                    }
                    Ok(RemoteOutput::Closed) => break BridgeEnd::RemoteClosed,
                    Err(e) => {
                        debug!("remote output ended: {}", e);
                        break BridgeEnd::RemoteClosed;
                    }
                },
                relayed = &mut input_task => {
                    match relayed {
                        Ok(Ok(total)) => debug!("local input closed after {} bytes", total),
                        Ok(Err(e)) => debug!("input relay ended: {}", e),
                        Err(e) => debug!("input relay task failed: {}", e),
                    }
                    break BridgeEnd::InputClosed;
                }
                notification = resize.recv(), if resize_open => match notification {
                    Some(()) => forward_resize(terminal, remote).await,
                    None => resize_open = false,
                },
                _ = &mut shutdown => break BridgeEnd::Terminated,
            }
        };

        input_task.abort();
        drop(resize);
        let _ = local_out.flush().await;

        debug!("terminal bridge finished: {:?}", end);
        Ok(end)
    }
}

/// Copy local input to the remote side until EOF or error
async fn relay_input<R, I>(mut local_in: R, mut input: I) -> Result<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
    I: RemoteInput,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = local_in.read(&mut buf).await?;
        if n == 0 {
            input.finish().await?;
            return Ok(total);
        }
        input.send(&buf[..n]).await?;
        total += n as u64;
    }
}

async fn write_local<W: AsyncWrite + Unpin>(out: &mut W, data: &[u8]) -> std::io::Result<()> {
    out.write_all(data).await?;
    out.flush().await
}

/// Query the new size and send it; failures are logged only
async fn forward_resize<T, M>(terminal: &T, remote: &mut M)
where
    T: TerminalControl + ?Sized,
    M: RemoteTerminal + ?Sized,
{
    let size = match terminal.size() {
        Ok(size) => size,
        Err(e) => {
            warn!("Unable to send window-change request: {}", e);
            return;
        }
    };

    debug!("window changed to {}x{}", size.cols, size.rows);
    if let Err(e) = remote.resize(size).await {
        warn!("Window change err: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JmsToolError;
    use crate::terminal::testing::MockTerminal;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::sync::mpsc;

    /// Remote double: output is fed through a channel, resizes are recorded
    struct MockRemote {
        output: mpsc::UnboundedReceiver<Result<RemoteOutput>>,
        resizes: Arc<Mutex<Vec<WindowSize>>>,
        fail_resize: bool,
    }

    #[async_trait]
    impl RemoteTerminal for MockRemote {
        async fn next_output(&mut self) -> Result<RemoteOutput> {
            match self.output.recv().await {
                Some(output) => output,
                None => Ok(RemoteOutput::Closed),
            }
        }

        async fn resize(&mut self, size: WindowSize) -> Result<()> {
            self.resizes.lock().unwrap().push(size);
            if self.fail_resize {
                return Err(JmsToolError::session("window-change rejected"));
            }
            Ok(())
        }
    }

    struct MockInput {
        received: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl RemoteInput for MockInput {
        async fn send(&mut self, data: &[u8]) -> Result<()> {
            self.received.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
    }

    struct Harness {
        remote: MockRemote,
        output_tx: mpsc::UnboundedSender<Result<RemoteOutput>>,
        resizes: Arc<Mutex<Vec<WindowSize>>>,
        input: MockInput,
        received: Arc<Mutex<Vec<u8>>>,
    }

    fn harness() -> Harness {
        let (output_tx, output) = mpsc::unbounded_channel();
        let resizes = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        Harness {
            remote: MockRemote {
                output,
                resizes: Arc::clone(&resizes),
                fail_resize: false,
            },
            output_tx,
            resizes,
            input: MockInput {
                received: Arc::clone(&received),
            },
            received,
        }
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_remote_close_ends_session_while_input_open() {
        let mut h = harness();
        let terminal = MockTerminal::default();
        let (_resize_tx, resize) = ResizeNotifier::channel();

        // Local input stays open for the whole test
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, mut stdout_reader) = duplex(1024);

        h.output_tx
            .send(Ok(RemoteOutput::Data(b"Last login: today\r\n".to_vec())))
            .unwrap();
        h.output_tx.send(Ok(RemoteOutput::Closed)).unwrap();

        let end = TerminalBridge::new(&terminal, resize)
            .run(stdin, stdout, h.input, &mut h.remote, std::future::pending())
            .await
            .unwrap();
        assert_eq!(end, BridgeEnd::RemoteClosed);

        let mut buf = vec![0u8; 64];
        let n = stdout_reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Last login: today\r\n");

        assert!(!terminal.is_raw());
        assert_eq!(terminal.disabled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_input_eof_ends_session_while_remote_open() {
        let mut h = harness();
        let terminal = MockTerminal::default();
        let (_resize_tx, resize) = ResizeNotifier::channel();

        let (mut stdin_writer, stdin) = duplex(1024);
        let (stdout, _stdout_reader) = duplex(1024);

        stdin_writer.write_all(b"ls -la\r").await.unwrap();
        drop(stdin_writer);

        // output_tx kept alive in the harness: remote never closes
        let end = TerminalBridge::new(&terminal, resize)
            .run(stdin, stdout, h.input, &mut h.remote, std::future::pending())
            .await
            .unwrap();
        assert_eq!(end, BridgeEnd::InputClosed);
        assert_eq!(h.received.lock().unwrap().as_slice(), b"ls -la\r");
        assert!(!terminal.is_raw());
    }

    #[tokio::test]
    async fn test_resize_forwarded_with_new_size() {
        let mut h = harness();
        let terminal = MockTerminal::with_size(WindowSize::new(80, 24));
        let (resize_tx, resize) = ResizeNotifier::channel();
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, _stdout_reader) = duplex(1024);

        let resizes = Arc::clone(&h.resizes);
        let output_tx = h.output_tx.clone();
        let terminal_ref = &terminal;
        let driver = async move {
            terminal_ref.set_size(Some(WindowSize::new(132, 43)));
            resize_tx.send(()).await.unwrap();
            wait_for(|| resizes.lock().unwrap().len() == 1).await;

            terminal_ref.set_size(Some(WindowSize::new(100, 30)));
            resize_tx.send(()).await.unwrap();
            wait_for(|| resizes.lock().unwrap().len() == 2).await;

            output_tx.send(Ok(RemoteOutput::Closed)).unwrap();
        };

        let (end, ()) = tokio::join!(
            TerminalBridge::new(&terminal, resize).run(
                stdin,
                stdout,
                h.input,
                &mut h.remote,
                std::future::pending()
            ),
            driver
        );

        assert_eq!(end.unwrap(), BridgeEnd::RemoteClosed);
        assert_eq!(
            h.resizes.lock().unwrap().as_slice(),
            &[WindowSize::new(132, 43), WindowSize::new(100, 30)]
        );
    }

    #[tokio::test]
    async fn test_resize_failures_do_not_end_session() {
        let mut h = harness();
        h.remote.fail_resize = true;
        let terminal = MockTerminal::with_size(WindowSize::new(120, 40));
        let (resize_tx, resize) = ResizeNotifier::channel();
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, mut stdout_reader) = duplex(1024);

        let resizes = Arc::clone(&h.resizes);
        let output_tx = h.output_tx.clone();
        let terminal_ref = &terminal;
        let driver = async move {
            // Rejected by the remote side
            resize_tx.send(()).await.unwrap();
            wait_for(|| resizes.lock().unwrap().len() == 1).await;

            // Size query fails: nothing is sent
            terminal_ref.set_size(None);
            resize_tx.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            output_tx
                .send(Ok(RemoteOutput::Data(b"still here".to_vec())))
                .unwrap();
            output_tx.send(Ok(RemoteOutput::Closed)).unwrap();
        };

        let (end, ()) = tokio::join!(
            TerminalBridge::new(&terminal, resize).run(
                stdin,
                stdout,
                h.input,
                &mut h.remote,
                std::future::pending()
            ),
            driver
        );

        assert_eq!(end.unwrap(), BridgeEnd::RemoteClosed);
        assert_eq!(h.resizes.lock().unwrap().len(), 1);

        let mut buf = vec![0u8; 64];
        let n = stdout_reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"still here");
    }

    #[tokio::test]
    async fn test_closed_resize_source_does_not_end_session() {
        let mut h = harness();
        let terminal = MockTerminal::default();
        let (resize_tx, resize) = ResizeNotifier::channel();
        drop(resize_tx);
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, _stdout_reader) = duplex(1024);

        let output_tx = h.output_tx.clone();
        let driver = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            output_tx.send(Ok(RemoteOutput::Closed)).unwrap();
        };

        let (end, ()) = tokio::join!(
            TerminalBridge::new(&terminal, resize).run(
                stdin,
                stdout,
                h.input,
                &mut h.remote,
                std::future::pending()
            ),
            driver
        );
        assert_eq!(end.unwrap(), BridgeEnd::RemoteClosed);
    }

    #[tokio::test]
    async fn test_remote_error_restores_terminal() {
        let mut h = harness();
        let terminal = MockTerminal::default();
        let (_resize_tx, resize) = ResizeNotifier::channel();
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, _stdout_reader) = duplex(1024);

        h.output_tx
            .send(Err(JmsToolError::session("connection reset")))
            .unwrap();

        let end = TerminalBridge::new(&terminal, resize)
            .run(stdin, stdout, h.input, &mut h.remote, std::future::pending())
            .await
            .unwrap();
        assert_eq!(end, BridgeEnd::RemoteClosed);
        assert!(!terminal.is_raw());
        assert_eq!(terminal.enabled.load(Ordering::SeqCst), 1);
        assert_eq!(terminal.disabled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_termination_signal_ends_session() {
        let mut h = harness();
        let terminal = MockTerminal::default();
        let (_resize_tx, resize) = ResizeNotifier::channel();
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, _stdout_reader) = duplex(1024);

        let end = TerminalBridge::new(&terminal, resize)
            .run(stdin, stdout, h.input, &mut h.remote, async {
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
            .await
            .unwrap();
        assert_eq!(end, BridgeEnd::Terminated);
        assert!(!terminal.is_raw());
    }

    #[tokio::test]
    async fn test_raw_mode_failure_is_an_error() {
        let mut h = harness();
        let terminal = MockTerminal {
            fail_enable: true,
            ..Default::default()
        };
        let (_resize_tx, resize) = ResizeNotifier::channel();
        let (_stdin_writer, stdin) = duplex(1024);
        let (stdout, _stdout_reader) = duplex(1024);

        let result = TerminalBridge::new(&terminal, resize)
            .run(stdin, stdout, h.input, &mut h.remote, std::future::pending())
            .await;
        assert!(matches!(result, Err(JmsToolError::Io(_))));
    }

    #[tokio::test]
    async fn test_writer_input() {
        let (writer, mut reader) = duplex(64);
        let mut input = WriterInput::new(writer);
        input.send(b"echo hi\r").await.unwrap();
        input.finish().await.unwrap();

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"echo hi\r");
    }
}

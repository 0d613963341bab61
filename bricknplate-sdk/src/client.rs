//! Twitch chat client.
//!
//! This is the main entry point for SDK consumers. It manages the TCP/TLS
//! connection, Twitch login (`PASS oauth:` + `NICK`), capability requests for
//! tags and commands, keepalive, paced sending, and emits [`Event`]s.
//!
//! ## Rate limits
//!
//! Twitch drops messages from non-moderator accounts that send more than
//! 20 lines per 30 seconds. Outgoing `PRIVMSG`s are spaced by
//! [`ConnectConfig::send_interval`] (1.5 s by default) to stay under it.
//!
//! ## Reconnection
//!
//! [`run_with_reconnect`] drives the whole lifecycle: it connects, rejoins
//! channels after each registration, and reconnects with exponential backoff
//! (2→4→8→16→30s cap, with jitter) whenever the connection drops or Twitch
//! sends `RECONNECT`. Only a rejected login ends the loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;

use crate::event::Event;
use crate::irc::Message;

/// Default Twitch chat endpoint (TLS).
pub const TWITCH_IRC_ADDR: &str = "irc.chat.twitch.tv:6697";

/// Configuration for connecting to Twitch chat.
#[derive(Clone)]
pub struct ConnectConfig {
    /// Server address (host:port).
    pub server_addr: String,
    /// Bot login name.
    pub nick: String,
    /// Chat OAuth token, with or without the `oauth:` prefix.
    pub oauth_token: String,
    /// Use TLS. Port 6697 implies TLS regardless.
    pub tls: bool,
    /// Minimum spacing between outgoing chat messages.
    pub send_interval: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            server_addr: TWITCH_IRC_ADDR.to_string(),
            nick: "justinfan12345".to_string(),
            oauth_token: String::new(),
            tls: true,
            send_interval: Duration::from_millis(1500),
        }
    }
}

impl std::fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("server_addr", &self.server_addr)
            .field("nick", &self.nick)
            .field("oauth_token", &"<redacted>")
            .field("tls", &self.tls)
            .field("send_interval", &self.send_interval)
            .finish()
    }
}

impl ConnectConfig {
    fn pass_line(&self) -> String {
        let token = self.oauth_token.trim();
        if token.starts_with("oauth:") {
            format!("PASS {token}\r\n")
        } else {
            format!("PASS oauth:{token}\r\n")
        }
    }
}

/// Commands the consumer can send to the client.
#[derive(Debug)]
pub enum Command {
    Join(String),
    Privmsg { target: String, text: String },
    Raw(String),
    Quit(Option<String>),
}

/// A handle to a running chat connection.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    pub async fn join(&self, channel: &str) -> Result<()> {
        self.cmd_tx.send(Command::Join(channel.to_string())).await?;
        Ok(())
    }

    /// Send a chat line. Newlines are not allowed on the wire, so they are
    /// folded into spaces.
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        let text = text.replace(['\r', '\n'], " ");
        self.cmd_tx
            .send(Command::Privmsg {
                target: target.to_string(),
                text,
            })
            .await?;
        Ok(())
    }

    pub async fn quit(&self, message: Option<&str>) -> Result<()> {
        self.cmd_tx
            .send(Command::Quit(message.map(|s| s.to_string())))
            .await?;
        Ok(())
    }

    pub async fn raw(&self, line: &str) -> Result<()> {
        self.cmd_tx.send(Command::Raw(line.to_string())).await?;
        Ok(())
    }
}

/// Establish TCP (and optionally TLS) connection to the server.
pub async fn establish_connection(config: &ConnectConfig) -> Result<EstablishedConnection> {
    // Auto-detect TLS from port if not explicitly set
    let use_tls = config.tls || config.server_addr.ends_with(":6697");
    let mode = if use_tls { "TLS" } else { "plain" };

    tracing::debug!("Resolving {}...", config.server_addr);
    let tcp = TcpStream::connect(&config.server_addr)
        .await
        .map_err(|e| anyhow::anyhow!("TCP connect to {} failed: {e}", config.server_addr))?;
    tracing::debug!("TCP connected to {} ({mode})", config.server_addr);

    if use_tls {
        let connector = TlsConnector::from(Arc::new(rustls_default_config()));
        let server_name = config
            .server_addr
            .split(':')
            .next()
            .unwrap_or("localhost");
        let dns_name = rustls::pki_types::ServerName::try_from(server_name.to_string())?;
        let tls_stream = connector
            .connect(dns_name, tcp)
            .await
            .map_err(|e| anyhow::anyhow!("TLS handshake with {} failed: {e}", config.server_addr))?;
        tracing::debug!("TLS handshake complete");
        Ok(EstablishedConnection::Tls(Box::new(tls_stream)))
    } else {
        Ok(EstablishedConnection::Plain(tcp))
    }
}

/// A connection that has completed TCP (and optionally TLS) but hasn't
/// logged in yet.
pub enum EstablishedConnection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// Connect using an already-established connection.
///
/// Returns a handle for sending commands and a receiver for events.
/// The chat protocol runs in a spawned task.
pub fn connect_with_stream(
    conn: EstablishedConnection,
    config: ConnectConfig,
) -> (ClientHandle, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(4096);
    let (cmd_tx, cmd_rx) = mpsc::channel(256);

    let handle = ClientHandle { cmd_tx };

    tokio::spawn(async move {
        let _ = event_tx.send(Event::Connected).await;
        let result = match conn {
            EstablishedConnection::Plain(tcp) => {
                let (reader, writer) = tokio::io::split(tcp);
                run_chat(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
            EstablishedConnection::Tls(tls) => {
                let (reader, writer) = tokio::io::split(tls);
                run_chat(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
        };
        if let Err(e) = result {
            let _ = event_tx
                .send(Event::Disconnected {
                    reason: e.to_string(),
                })
                .await;
        }
    });

    (handle, event_rx)
}

fn rustls_default_config() -> rustls::ClientConfig {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Twitch answers a bad token with a NOTICE rather than a numeric.
fn is_login_failure(text: &str) -> bool {
    text.contains("Login authentication failed") || text.contains("Improperly formatted auth")
}

async fn run_chat<R, W>(
    reader: R,
    mut writer: W,
    config: &ConnectConfig,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<Command>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(b"CAP REQ :twitch.tv/tags twitch.tv/commands\r\n")
        .await?;
    writer.write_all(config.pass_line().as_bytes()).await?;
    writer
        .write_all(format!("NICK {}\r\n", config.nick.to_lowercase()).as_bytes())
        .await?;
    writer.flush().await?;

    let mut registered = false;
    let mut pending_commands: Vec<Command> = Vec::new();
    let mut last_send: Option<Instant> = None;
    let mut lines = reader.lines();
    let mut last_activity = Instant::now();
    let mut awaiting_pong = false;
    let ping_interval = Duration::from_secs(60);
    let ping_timeout = Duration::from_secs(120);

    loop {
        tokio::select! {
            // `next_line` keeps partial input across cancellation.
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let _ = event_tx.send(Event::Disconnected { reason: "EOF".to_string() }).await;
                    break;
                };

                last_activity = Instant::now();
                awaiting_pong = false;
                let _ = event_tx.send(Event::RawLine(line.trim_end().to_string())).await;

                if let Some(msg) = Message::parse(&line) {
                    match msg.command.as_str() {
                        "001" => {
                            let nick = msg.params.first().cloned().unwrap_or_default();
                            let _ = event_tx.send(Event::Registered { nick }).await;
                            registered = true;
                            // Flush any commands that were queued before registration
                            for cmd in pending_commands.drain(..) {
                                execute_command(&mut writer, cmd, config.send_interval, &mut last_send).await?;
                            }
                        }
                        "PING" => {
                            let token = msg.params.first().map(|s| s.as_str()).unwrap_or("");
                            writer.write_all(format!("PONG :{token}\r\n").as_bytes()).await?;
                            writer.flush().await?;
                        }
                        "JOIN" => {
                            let channel = msg.params.first().cloned().unwrap_or_default();
                            let nick = msg.nick().unwrap_or("").to_string();
                            let _ = event_tx.send(Event::Joined { channel, nick }).await;
                        }
                        "PRIVMSG" => {
                            if msg.params.len() >= 2 {
                                let from = msg.nick().unwrap_or("").to_string();
                                let target = msg.params[0].clone();
                                let text = msg.params[1].clone();
                                let tags = msg.tags.clone();
                                let _ = event_tx.send(Event::Message { from, target, text, tags }).await;
                            }
                        }
                        "USERNOTICE" => {
                            if let Some(event) = Event::from_user_notice(&msg) {
                                let _ = event_tx.send(event).await;
                            }
                        }
                        "NOTICE" => {
                            let text = msg.params.last().cloned().unwrap_or_default();
                            if is_login_failure(&text) {
                                let _ = event_tx.send(Event::AuthFailed { reason: text.clone() }).await;
                                let _ = event_tx.send(Event::Disconnected { reason: text }).await;
                                break;
                            }
                            let channel = msg.params.first().filter(|p| p.starts_with('#')).cloned();
                            let _ = event_tx.send(Event::Notice { channel, text }).await;
                        }
                        "RECONNECT" => {
                            let _ = event_tx.send(Event::Disconnected { reason: "Server requested reconnect".to_string() }).await;
                            break;
                        }
                        "CAP" => {
                            tracing::debug!(params = ?msg.params, "Capability reply");
                        }
                        _ => {}
                    }
                }
            }
            Some(cmd) = cmd_rx.recv() => {
                if registered || matches!(cmd, Command::Quit(_)) {
                    let quitting = matches!(cmd, Command::Quit(_));
                    execute_command(&mut writer, cmd, config.send_interval, &mut last_send).await?;
                    if quitting {
                        let _ = event_tx.send(Event::Disconnected { reason: "Quit".to_string() }).await;
                        break;
                    }
                } else {
                    // Queue until registered; Twitch drops commands sent earlier
                    pending_commands.push(cmd);
                }
            }
            // Periodic client-to-server PING and timeout detection
            _ = tokio::time::sleep_until(
                last_activity + if awaiting_pong { ping_timeout } else { ping_interval }
            ) => {
                if awaiting_pong {
                    let _ = event_tx.send(Event::Disconnected { reason: "Ping timeout".to_string() }).await;
                    break;
                }
                writer.write_all(b"PING :tmi.twitch.tv\r\n").await?;
                writer.flush().await?;
                awaiting_pong = true;
            }
        }
    }

    Ok(())
}

/// Execute a single command on the wire, pacing chat messages.
async fn execute_command<W: AsyncWrite + Unpin>(
    writer: &mut W,
    cmd: Command,
    send_interval: Duration,
    last_send: &mut Option<Instant>,
) -> Result<()> {
    match cmd {
        Command::Join(channel) => {
            writer
                .write_all(format!("JOIN {}\r\n", channel.to_lowercase()).as_bytes())
                .await?;
        }
        Command::Privmsg { target, text } => {
            if let Some(prev) = *last_send {
                tokio::time::sleep_until(prev + send_interval).await;
            }
            writer
                .write_all(format!("PRIVMSG {target} :{text}\r\n").as_bytes())
                .await?;
            *last_send = Some(Instant::now());
        }
        Command::Raw(line) => {
            writer.write_all(format!("{line}\r\n").as_bytes()).await?;
        }
        Command::Quit(msg) => {
            let quit_line = match msg {
                Some(m) => format!("QUIT :{m}\r\n"),
                None => "QUIT\r\n".to_string(),
            };
            writer.write_all(quit_line.as_bytes()).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Reconnection policy for [`run_with_reconnect`].
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Channels to rejoin after reconnecting.
    pub channels: Vec<String>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            channels: Vec::new(),
        }
    }
}

impl ReconnectConfig {
    fn next_delay(&self, delay: Duration) -> Duration {
        let jitter = rand_jitter(delay.as_millis() as u64 / 4);
        Duration::from_millis(
            ((delay.as_millis() as f64 * self.backoff_factor) as u64 + jitter)
                .min(self.max_delay.as_millis() as u64),
        )
    }
}

/// Run an event loop with automatic reconnection.
///
/// The `handler` is called for each event, one at a time. When disconnected,
/// the loop reconnects with exponential backoff and rejoins configured
/// channels.
///
/// Returns only when Twitch rejects the login.
///
/// # Example
///
/// ```rust,no_run
/// use bricknplate_sdk::client::{ConnectConfig, ReconnectConfig, run_with_reconnect};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = ConnectConfig { nick: "mybot".into(), oauth_token: "oauth:...".into(), ..Default::default() };
/// let reconnect = ReconnectConfig {
///     channels: vec!["#mychannel".into()],
///     ..Default::default()
/// };
///
/// run_with_reconnect(config, reconnect, |handle, event| {
///     Box::pin(async move {
///         // handle event
///         Ok(())
///     })
/// }).await
/// # }
/// ```
pub async fn run_with_reconnect<F>(
    config: ConnectConfig,
    reconnect_config: ReconnectConfig,
    handler: F,
) -> Result<()>
where
    F: Fn(ClientHandle, Event) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
{
    let mut delay = reconnect_config.initial_delay;
    let mut consecutive_failures = 0u32;

    loop {
        let conn = match establish_connection(&config).await {
            Ok(c) => {
                consecutive_failures = 0;
                delay = reconnect_config.initial_delay;
                c
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(
                    error = %e,
                    attempt = consecutive_failures,
                    delay_secs = delay.as_secs(),
                    "Connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = reconnect_config.next_delay(delay);
                continue;
            }
        };

        let (handle, mut events) = connect_with_stream(conn, config.clone());

        let mut auth_failure = None;
        while let Some(event) = events.recv().await {
            // JOINs before the welcome numeric are dropped by Twitch.
            if matches!(&event, Event::Registered { .. }) {
                for ch in &reconnect_config.channels {
                    let _ = handle.join(ch).await;
                }
            }
            if let Event::AuthFailed { reason } = &event {
                auth_failure = Some(reason.clone());
            }
            let disconnected = matches!(&event, Event::Disconnected { .. });
            if let Err(e) = handler(handle.clone(), event).await {
                tracing::error!(error = %e, "Handler error");
                // Non-fatal: continue processing
            }
            if disconnected {
                break;
            }
        }

        if let Some(reason) = auth_failure {
            anyhow::bail!("Twitch rejected the login: {reason}");
        }

        tracing::info!(delay_secs = delay.as_secs(), "Disconnected, will reconnect");
        tokio::time::sleep(delay).await;
        delay = reconnect_config.next_delay(delay);
    }
}

/// Simple jitter: value in 0..max derived from the clock.
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn test_config() -> ConnectConfig {
        ConnectConfig {
            server_addr: "127.0.0.1:0".into(),
            nick: "BrickNPlateBot".into(),
            oauth_token: "abc123".into(),
            tls: false,
            send_interval: Duration::from_millis(0),
        }
    }

    /// Spawn `run_chat` against an in-memory peer; returns the server side.
    fn spawn_client() -> (ClientHandle, mpsc::Receiver<Event>, DuplexStream) {
        let (client_side, server_side) = tokio::io::duplex(16 * 1024);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(client_side);
            let _ = run_chat(BufReader::new(reader), writer, &test_config(), event_tx, cmd_rx).await;
        });
        (ClientHandle { cmd_tx }, event_rx, server_side)
    }

    async fn next_non_raw(events: &mut mpsc::Receiver<Event>) -> Event {
        loop {
            match events.recv().await.expect("event stream closed") {
                Event::RawLine(_) => continue,
                other => return other,
            }
        }
    }

    async fn read_until(server: &mut DuplexStream, needle: &str) -> String {
        let mut seen = String::new();
        let mut buf = [0u8; 1024];
        while !seen.contains(needle) {
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending {needle:?}; got {seen:?}");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        seen
    }

    #[test]
    fn pass_line_adds_oauth_prefix_once() {
        let mut cfg = test_config();
        assert_eq!(cfg.pass_line(), "PASS oauth:abc123\r\n");
        cfg.oauth_token = "oauth:abc123".into();
        assert_eq!(cfg.pass_line(), "PASS oauth:abc123\r\n");
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("abc123"));
    }

    #[tokio::test]
    async fn logs_in_and_emits_chat_events() {
        let (handle, mut events, mut server) = spawn_client();

        let hello = read_until(&mut server, "NICK bricknplatebot\r\n").await;
        assert!(hello.contains("CAP REQ :twitch.tv/tags twitch.tv/commands\r\n"));
        assert!(hello.contains("PASS oauth:abc123\r\n"));

        // Commands issued before the welcome numeric are queued.
        handle.join("#BrickNPlate").await.unwrap();

        server
            .write_all(b":tmi.twitch.tv 001 bricknplatebot :Welcome, GLHF!\r\n")
            .await
            .unwrap();
        assert_eq!(
            next_non_raw(&mut events).await,
            Event::Registered { nick: "bricknplatebot".into() }
        );
        read_until(&mut server, "JOIN #bricknplate\r\n").await;

        server.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
        read_until(&mut server, "PONG :tmi.twitch.tv\r\n").await;

        server
            .write_all(b"@display-name=Fan :fan!fan@fan.tmi.twitch.tv PRIVMSG #bricknplate :hi bot\r\n")
            .await
            .unwrap();
        match next_non_raw(&mut events).await {
            Event::Message { from, target, text, tags } => {
                assert_eq!(from, "fan");
                assert_eq!(target, "#bricknplate");
                assert_eq!(text, "hi bot");
                assert_eq!(tags["display-name"], "Fan");
            }
            other => panic!("unexpected event {other:?}"),
        }

        handle.privmsg("#bricknplate", "hello\nthere").await.unwrap();
        read_until(&mut server, "PRIVMSG #bricknplate :hello there\r\n").await;
    }

    #[tokio::test]
    async fn partial_line_survives_outgoing_message() {
        let (handle, mut events, mut server) = spawn_client();
        read_until(&mut server, "NICK bricknplatebot\r\n").await;
        server
            .write_all(b":tmi.twitch.tv 001 bricknplatebot :Welcome, GLHF!\r\n")
            .await
            .unwrap();
        assert!(matches!(next_non_raw(&mut events).await, Event::Registered { .. }));

        // Half a line arrives, then the bot sends before the rest does.
        server
            .write_all(b"@display-name=Fan :fan!fan@fan.tmi.twitch.tv PRIVMSG #bricknplate :hey bricknpl")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.privmsg("#bricknplate", "reply").await.unwrap();
        read_until(&mut server, "PRIVMSG #bricknplate :reply\r\n").await;
        server
            .write_all(b"atebot what are we building?\r\n")
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), next_non_raw(&mut events))
            .await
            .expect("chat line was dropped");
        match event {
            Event::Message { from, text, .. } => {
                assert_eq!(from, "fan");
                assert_eq!(text, "hey bricknplatebot what are we building?");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn usernotice_becomes_raid_event() {
        let (_handle, mut events, mut server) = spawn_client();
        server
            .write_all(b"@login=raider;msg-id=raid;msg-param-login=raider;msg-param-viewerCount=12 :tmi.twitch.tv USERNOTICE #bricknplate\r\n")
            .await
            .unwrap();
        assert_eq!(
            next_non_raw(&mut events).await,
            Event::Raid {
                channel: "#bricknplate".into(),
                raider: "raider".into(),
                viewers: 12,
            }
        );
    }

    #[tokio::test]
    async fn login_failure_ends_session() {
        let (_handle, mut events, mut server) = spawn_client();
        server
            .write_all(b":tmi.twitch.tv NOTICE * :Login authentication failed\r\n")
            .await
            .unwrap();
        assert!(matches!(next_non_raw(&mut events).await, Event::AuthFailed { .. }));
        assert!(matches!(next_non_raw(&mut events).await, Event::Disconnected { .. }));
    }

    #[tokio::test]
    async fn reconnect_request_disconnects() {
        let (_handle, mut events, mut server) = spawn_client();
        server.write_all(b":tmi.twitch.tv RECONNECT\r\n").await.unwrap();
        assert_eq!(
            next_non_raw(&mut events).await,
            Event::Disconnected { reason: "Server requested reconnect".into() }
        );
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = ReconnectConfig::default();
        let mut delay = cfg.initial_delay;
        for _ in 0..10 {
            delay = cfg.next_delay(delay);
            assert!(delay <= cfg.max_delay);
        }
        assert_eq!(delay, cfg.max_delay);
    }
}

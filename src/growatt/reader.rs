use crate::prelude::*;
use crate::growatt::link::Connector;

use chrono::Local;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

/// First stage of the logger handshake; asks the inverter to start sending.
pub const INIT_COMMAND: &[u8] = &[
    0x3F, 0x23, 0x7E, 0x34, 0x41, 0x7E, 0x32, 0x59, 0x31, 0x35, 0x30, 0x30, 0x23, 0x3F,
];

/// Second stage, commits the request.
pub const COMMIT_COMMAND: &[u8] = &[0x3F, 0x23, 0x7E, 0x34, 0x42, 0x7E, 0x23, 0x3F];

pub const INIT_OK: &str = "OK";

const SETTLE_DELAY: Duration = Duration::from_millis(250);
const RESPONSE_LEN: usize = 64;
const READ_LEN: usize = 64;

/// Why a read session ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    /// No data within `respawn_after`.
    Respawn,
    /// The poke timer found the link stale.
    Poked,
}

/// Reads raw bytes from the inverter into the queue and keeps the link alive.
#[derive(Clone)]
pub struct Reader {
    config: config::Reader,
    connector: Arc<dyn Connector>,
    queue: Arc<ByteQueue>,
    status: StatusBoard,
    last_update: Arc<Mutex<Instant>>,
    poke: Arc<Notify>,
}

impl Reader {
    pub fn new(
        config: config::Reader,
        connector: Arc<dyn Connector>,
        queue: Arc<ByteQueue>,
        status: StatusBoard,
    ) -> Self {
        Self {
            config,
            connector,
            queue,
            status,
            last_update: Arc::new(Mutex::new(Instant::now())),
            poke: Arc::new(Notify::new()),
        }
    }

    /// Supervises read sessions forever, re-initialising the inverter
    /// whenever a session ended because the device went quiet.
    pub async fn start(&self) -> Result<()> {
        let poker = self.clone();
        tokio::spawn(async move { poker.poker().await });

        loop {
            if self.status.init() != INIT_OK {
                self.queue.clear();
                if let Err(e) = self.init_logger().await {
                    warn!("inverter init failed: {}", e);
                    info!("retrying init in {}s", self.config.init_cooldown.as_secs());
                    self.status.set_reader("Waiting for init");
                    tokio::time::sleep(self.config.init_cooldown).await;
                    continue;
                }
            }

            info!("Serial reader starting.");
            match self.read_session().await {
                Ok(session) => {
                    self.status.update_stats(|s| match session {
                        Session::Respawn => s.respawns += 1,
                        Session::Poked => s.pokes += 1,
                    });
                    self.status.set_init(format!("{:?}", session));
                }
                Err(e) => {
                    warn!("{}", e);
                    info!("reconnecting in {}s", self.config.reconnect_delay.as_secs());
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
            }
            self.status.set_reader("Stopped reading.");
        }
    }

    /// Opens the link, sends the two-stage handshake and closes it again.
    pub async fn init_logger(&self) -> Result<()> {
        info!("Sending initialisation to inverter...");
        self.status.set_init("Starting");

        let result = self.handshake().await;
        if result.is_err() {
            self.status.update_stats(|s| s.init_failures += 1);
        }
        result
    }

    async fn handshake(&self) -> Result<()> {
        let mut link = match self.connector.open().await {
            Ok(link) => link,
            Err(e) => {
                self.status.set_init("Failed to open connection");
                return Err(e);
            }
        };
        self.status.set_init("Initializing");

        if let Err(e) = send_command(&mut link, "Init", INIT_COMMAND, self.config.response_timeout).await {
            self.status.set_init("Failed on sending request");
            return Err(e);
        }
        self.status.set_init("Committing request");

        if let Err(e) = send_command(&mut link, "Commit", COMMIT_COMMAND, self.config.response_timeout).await {
            self.status.set_init("Failed on commit");
            return Err(e);
        }

        self.status.set_init(INIT_OK);
        info!("Sent init command to Growatt inverter.");
        Ok(())
    }

    /// Reads until the link fails, goes quiet for `respawn_after`, or is
    /// poked. The queue is cleared on the quiet paths since whatever is left
    /// in it belongs to a stream that will be restarted.
    pub async fn read_session(&self) -> Result<Session> {
        info!("Connecting to {}", self.connector.describe());
        self.status.set_reader("Connecting");

        let mut link = self.connector.open().await?;

        let mut buf = [0u8; READ_LEN];
        let mut reading = false;

        loop {
            tokio::select! {
                _ = self.poke.notified() => {
                    warn!("Poked, closing connection");
                    self.queue.clear();
                    return Ok(Session::Poked);
                }

                read = timeout(self.config.respawn_after, link.read(&mut buf)) => {
                    let n = match read {
                        Ok(Ok(0)) => bail!("Reading stopped: connection closed"),
                        Ok(Ok(n)) => n,
                        Ok(Err(e)) => bail!("Reading failed due to: {}", e),
                        Err(_) => {
                            warn!(
                                "no data for {}s, respawning...",
                                self.config.respawn_after.as_secs()
                            );
                            self.queue.clear();
                            return Ok(Session::Respawn);
                        }
                    };

                    self.touch();
                    if !reading {
                        reading = true;
                        info!("Reading started with {} bytes.", n);
                        self.status
                            .set_reader(format!("Reading since {}", Local::now().format("%H:%M:%S")));
                    }
                    trace!("read {} bytes: {:02x?}", n, &buf[..n]);

                    self.queue.push_all(&buf[..n]);
                    self.status.update_stats(|s| s.bytes_read += n as u64);
                }
            }
        }
    }

    /// Time since the last byte arrived, or since the reader was created.
    pub fn idle_for(&self) -> Duration {
        self.last_update
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Wakes a read session that is waiting on a stale link.
    pub fn poke(&self) {
        self.poke.notify_waiters();
    }

    /// Pokes the reader every `poke_interval` while no byte has arrived for
    /// longer than `respawn_after`.
    pub async fn poker(&self) {
        let mut interval = tokio::time::interval(self.config.poke_interval);
        interval.tick().await;

        loop {
            interval.tick().await;
            if self.idle_for() > self.config.respawn_after {
                warn!("Poke needed. Reader can't read data.");
                self.poke();
            } else {
                debug!("No poke needed.");
            }
        }
    }

    fn touch(&self) {
        if let Ok(mut t) = self.last_update.lock() {
            *t = Instant::now();
        }
    }
}

/// Writes one handshake stage and checks the reply.
///
/// A reply of identical bytes means the inverter is not ready: 0xff while it
/// is still starting, 0xde while shutting down.
pub async fn send_command<L>(
    link: &mut L,
    task: &str,
    command: &[u8],
    response_timeout: Duration,
) -> Result<Vec<u8>>
where
    L: AsyncRead + AsyncWrite + Unpin,
{
    link.write_all(command)
        .await
        .map_err(|e| anyhow!("{} not sent: {}", task, e))?;
    link.flush()
        .await
        .map_err(|e| anyhow!("{} not sent: {}", task, e))?;

    tokio::time::sleep(SETTLE_DELAY).await;

    let mut buf = [0u8; RESPONSE_LEN];
    let n = match timeout(response_timeout, link.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => bail!("{} not accepted: {}", task, e),
        Err(_) => 0,
    };
    if n == 0 {
        bail!("{} not accepted: Empty response.", task);
    }

    let response = &buf[..n];
    if response.iter().all(|b| *b == response[0]) {
        bail!("{} not accepted: Code {}.", task, response[0]);
    }

    debug!("{} response ({} bytes): {:02x?}", task, n, response);
    Ok(response.to_vec())
}

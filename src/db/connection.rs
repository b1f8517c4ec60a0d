use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the embedded SQLite database.
///
/// All statements run on one dedicated worker thread; callers hand it closures
/// over a channel and await the reply. Cloning the handle is cheap.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let database = Self::spawn(move || Connection::open(&path_for_thread))?;
        info!("Database initialized at {}", db_path.display());
        Ok(database)
    }

    /// Opens a private in-memory database. Used by tests and by the shell when
    /// the data directory is unavailable.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(Connection::open_in_memory)
    }

    fn spawn<F>(open: F) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("betterlife-db".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(
                            anyhow::Error::new(err).context("failed to open SQLite database")
                        ));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Queues a write without waiting for it. Failures are logged on the
    /// worker thread. Writes from one caller are applied in submission order.
    pub fn submit<F>(&self, label: &'static str, task: F)
    where
        F: FnOnce(&mut Connection) -> Result<()> + Send + 'static,
    {
        let command = DbCommand::Execute(Box::new(move |conn| {
            if let Err(err) = task(conn) {
                error!("Background DB write '{label}' failed: {err:?}");
            }
        }));

        if let Err(err) = self.inner.sender.send(command) {
            error!("Failed to queue DB write '{label}': {err}");
        }
    }
}

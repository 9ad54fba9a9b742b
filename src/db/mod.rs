use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod migrations;
pub mod repositories;

use migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// The thread that owns the connection, plus the queue feeding it.
struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    // Runs when the last `Database` clone goes away. Jobs already queued finish first.
    fn drop(&mut self) {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(thread) = thread else {
            return;
        };

        if self.jobs.send(Message::Stop).is_err() {
            warn!("Database thread already stopped");
        }
        if thread.join().is_err() {
            error!("Database thread panicked");
        }
    }
}

/// Handle to the SQLite key-value database. Every statement runs on one dedicated
/// thread, so all writers are serialized no matter how many clones of the handle exist.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    /// Opens (or creates) the database at `path` and brings its schema up to date.
    /// Fails if the file cannot be opened or migrated.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let thread_path = path.clone();

        let thread = thread::Builder::new()
            .name("snaptext-db".into())
            .spawn(move || match open_connection(&thread_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, jobs_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn the database thread")?;

        ready_rx
            .recv()
            .context("database thread exited during startup")??;

        info!("Database ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Queues `task` on the database thread and awaits its result without blocking
    /// the async runtime.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("Database caller went away before its result was ready");
            }
        });

        self.worker
            .jobs
            .send(Message::Run(job))
            .map_err(|_| anyhow!("database thread is not running"))?;

        reply_rx
            .await
            .context("database thread dropped the request")?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Could not switch SQLite to WAL mode: {err}");
    }

    run_migrations(&mut conn).context("failed to migrate the database schema")?;
    Ok(conn)
}

fn serve(mut conn: Connection, jobs: mpsc::Receiver<Message>) {
    for message in jobs {
        match message {
            Message::Run(job) => job(&mut conn),
            Message::Stop => break,
        }
    }
    debug!("Database thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_one_database_thread() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();
        let clone = db.clone();

        let thread_name = |db: Database| async move {
            db.execute(|_| Ok(thread::current().name().map(str::to_owned)))
                .await
                .unwrap()
        };

        assert_eq!(thread_name(db).await.as_deref(), Some("snaptext-db"));
        assert_eq!(thread_name(clone).await.as_deref(), Some("snaptext-db"));
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        let result: Result<()> = db
            .execute(|conn| {
                conn.execute_batch("SELECT * FROM missing_table")?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        let answer: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT 42", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(answer, 42);
    }

    #[test]
    fn unopenable_path_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Database::new(dir.path().to_path_buf()).is_err());
    }
}

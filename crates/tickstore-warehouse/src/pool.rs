//! Shared-instance DuckDB connection pool.
//!
//! DuckDB locks a database file per process instance, so every pooled
//! connection is a [`Connection::try_clone`] of one root connection rather
//! than a fresh `Connection::open`. A pool opened [`AccessMode::ReadOnly`]
//! lets DuckDB itself refuse every write.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ::duckdb::{AccessMode, Config, Connection};

use crate::WarehouseError;

struct PoolState {
    root: Connection,
    idle: Vec<Connection>,
}

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn lock(&self) -> Result<MutexGuard<'_, PoolState>, WarehouseError> {
        self.state.lock().map_err(|_| WarehouseError::PoolPoisoned)
    }
}

#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("db_path", &self.inner.db_path)
            .field("max_idle", &self.inner.max_idle)
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Opens the database file and keeps up to `max_idle` spare connections.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, WarehouseError> {
        Self::open_with_mode(path, max_idle, AccessMode::ReadWrite)
    }

    pub fn open_with_mode(
        path: impl Into<PathBuf>,
        max_idle: usize,
        mode: AccessMode,
    ) -> Result<Self, WarehouseError> {
        let db_path = path.into();
        let root = Connection::open_with_flags(&db_path, Config::default().access_mode(mode)?)?;
        configure_connection(&root)?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_idle: max_idle.max(1),
                state: Mutex::new(PoolState {
                    root,
                    idle: Vec::new(),
                }),
            }),
        })
    }

    pub fn acquire(&self) -> Result<PooledConnection, WarehouseError> {
        let mut state = self.inner.lock()?;
        let connection = match state.idle.pop() {
            Some(connection) => connection,
            None => {
                let connection = state.root.try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };
        drop(state);

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.lock().map_or(0, |state| state.idle.len())
    }
}

/// Connection checked out of a [`ConnectionPool`]; returned on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    // Only `Drop` takes the connection out.
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection taken before drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection taken before drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let Ok(mut state) = self.pool.lock() else {
            return;
        };
        if state.idle.len() < self.pool.max_idle {
            state.idle.push(connection);
        }
    }
}

fn configure_connection(connection: &Connection) -> Result<(), WarehouseError> {
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(())
}

//! Row locking options.

/// Requested locking mode, translated per dialect at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared read lock (`FOR SHARE` / `HOLDLOCK`).
    PessimisticRead,
    /// Exclusive write lock (`FOR UPDATE` / `UPDLOCK`).
    PessimisticWrite,
    /// Read uncommitted (`WITH (NOLOCK)` where available).
    DirtyRead,
    /// Postgres `FOR NO KEY UPDATE`.
    ForNoKeyUpdate,
    /// Postgres `FOR KEY SHARE`.
    ForKeyShare,
}

/// Behavior when a locked row is encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnLocked {
    Nowait,
    SkipLocked,
}

impl OnLocked {
    pub fn as_sql(self) -> &'static str {
        match self {
            OnLocked::Nowait => "NOWAIT",
            OnLocked::SkipLocked => "SKIP LOCKED",
        }
    }
}

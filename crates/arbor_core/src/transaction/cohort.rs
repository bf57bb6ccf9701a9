//! Multi-phase commit of a frozen transaction.

use crate::error::{CoreError, CoreResult};
use crate::store::StoreHandle;
use crate::transaction::assembly::assemble;
use crate::transaction::log::FrozenLog;
use crate::transaction::overlay::Observations;
use crate::types::{CohortState, CommitPhase, CommitState, SizeLimit, TransactionId};
use arbor_storage::{Revision, TxnOutcome, TxnRequest};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Commit progress shared by a transaction and its cohort.
#[derive(Debug)]
pub(crate) struct Progress {
    pub(crate) commit: CommitState,
    pub(crate) cohort: CohortState,
}

impl Progress {
    pub(crate) fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            commit: CommitState::Open,
            cohort: CohortState::NotStarted,
        }))
    }
}

/// Drives one frozen transaction through `can_commit`, `pre_commit` and
/// `commit`, or `abort`.
///
/// The phases must be invoked in that order, each at most once. A phase
/// that fails leaves the cohort in its previous state; the coordinator is
/// expected to call [`CommitCohort::abort`] afterwards.
///
/// # Example
///
/// ```rust
/// use arbor_core::{DataStore, Value};
/// use arbor_storage::InMemoryBackend;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = DataStore::new(Arc::new(InMemoryBackend::new()));
/// let mut txn = store.begin();
/// txn.write("/greeting", Value::from("hello")).unwrap();
///
/// let mut cohort = txn.ready().unwrap();
/// cohort.can_commit().await.unwrap();
/// cohort.pre_commit().await.unwrap();
/// cohort.commit().await.unwrap();
///
/// assert_eq!(store.read("/greeting").await.unwrap(), Some(Value::from("hello")));
/// # });
/// ```
pub struct CommitCohort {
    id: TransactionId,
    store: StoreHandle,
    log: FrozenLog,
    observations: Observations,
    open_revision: Revision,
    progress: Arc<Mutex<Progress>>,
    staged: Option<TxnRequest>,
    revision: Option<Revision>,
}

impl CommitCohort {
    pub(crate) fn new(
        id: TransactionId,
        store: StoreHandle,
        log: FrozenLog,
        observations: Observations,
        open_revision: Revision,
        progress: Arc<Mutex<Progress>>,
    ) -> Self {
        Self {
            id,
            store,
            log,
            observations,
            open_revision,
            progress,
            staged: None,
            revision: None,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current phase state.
    #[must_use]
    pub fn state(&self) -> CohortState {
        self.progress.lock().cohort
    }

    /// Returns the frozen log this cohort commits.
    pub fn log(&self) -> &FrozenLog {
        &self.log
    }

    /// Returns the backend state observed by the transaction's reads.
    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    /// Returns the backend revision the transaction was opened at.
    pub fn open_revision(&self) -> Revision {
        self.open_revision
    }

    /// Returns the request staged by `pre_commit`, until it is submitted.
    pub fn staged_request(&self) -> Option<&TxnRequest> {
        self.staged.as_ref()
    }

    /// Returns the backend revision produced by a successful commit.
    pub fn committed_revision(&self) -> Option<Revision> {
        self.revision
    }

    /// Validates that nothing the transaction read or overwrites has
    /// changed.
    ///
    /// Every observed range is read again; a new key, a missing key or a
    /// changed revision is a conflict. Then the subtree of every written
    /// path is scanned: a key there must still have the revision it was read
    /// at, and a key that was never read must not have been modified after
    /// the open revision. Nothing is written.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if a phase already ran or the cohort was aborted
    /// - `ConflictDetected` with phase `CanCommit` on a conflict
    /// - `BackendUnavailable` if a range read fails
    pub async fn can_commit(&mut self) -> CoreResult<()> {
        self.expect_state(CohortState::NotStarted, "can_commit")?;

        for prefix in self.observations.range_prefixes() {
            let current = self
                .store
                .backend
                .range_revisions(prefix)
                .await
                .map_err(CoreError::from_backend)?;
            if let Some(key) = self.observations.first_change(prefix, &current) {
                let key = self.describe(&key);
                warn!(txn = %self.id, key = %key, "conflict detected during can-commit");
                return Err(CoreError::conflict(CommitPhase::CanCommit, key));
            }
        }
        self.check_written_paths().await?;

        let mut progress = self.progress.lock();
        progress.cohort = CohortState::CanCommitChecked;
        progress.commit = CommitState::Committing;
        debug!(txn = %self.id, keys = self.observations.key_count(), "can-commit passed");
        Ok(())
    }

    /// Builds and validates the backend request without applying it.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless `can_commit` succeeded
    /// - `TransactionTooLarge` if the request exceeds a configured limit
    /// - `BackendUnavailable` if a range read fails
    pub async fn pre_commit(&mut self) -> CoreResult<()> {
        self.expect_state(CohortState::CanCommitChecked, "pre_commit")?;

        let request = assemble(
            self.log.operations(),
            self.store.backend.as_ref(),
            &self.store.keys,
            &self.observations,
        )
        .await?;
        self.check_limits(&request)?;

        debug!(
            txn = %self.id,
            compares = request.compares.len(),
            puts = request.puts.len(),
            deletes = request.deletes.len(),
            "staged commit request"
        );
        self.staged = Some(request);
        self.progress.lock().cohort = CohortState::PreCommitted;
        Ok(())
    }

    /// Submits the staged request and returns the new backend revision.
    ///
    /// The request is submitted exactly once, from a spawned task: dropping
    /// the returned future does not cancel an apply that is in flight. Must
    /// be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless `pre_commit` succeeded, or if the request was
    ///   already submitted
    /// - `ConflictDetected` with phase `Commit` if a compare failed
    /// - `BackendUnavailable` on a transport failure
    pub async fn commit(&mut self) -> CoreResult<Revision> {
        self.expect_state(CohortState::PreCommitted, "commit")?;
        let request = self
            .staged
            .take()
            .ok_or_else(|| CoreError::invalid_state("commit request was already submitted"))?;

        let store = self.store.clone();
        let progress = Arc::clone(&self.progress);
        let id = self.id;
        let task = tokio::spawn(async move {
            let outcome = store.backend.submit_txn(request).await;
            if let Ok(TxnOutcome::Committed { revision }) = &outcome {
                store.advance_revision(*revision);
                let mut state = progress.lock();
                state.cohort = CohortState::Committed;
                state.commit = CommitState::Committed;
                debug!(txn = %id, revision = %revision, "commit applied");
            }
            outcome
        });

        let outcome = task
            .await
            .map_err(|e| CoreError::backend_unavailable(format!("commit task failed: {e}")))?
            .map_err(CoreError::from_backend)?;

        match outcome {
            TxnOutcome::Committed { revision } => {
                self.revision = Some(revision);
                Ok(revision)
            }
            TxnOutcome::Conflict { failed_compares } => {
                let key = failed_compares
                    .first()
                    .map(|key| self.describe(key))
                    .unwrap_or_default();
                warn!(txn = %self.id, key = %key, "conflict detected during commit");
                Err(CoreError::conflict(CommitPhase::Commit, key))
            }
        }
    }

    /// Discards the cohort.
    ///
    /// Never fails and never touches the backend. After a successful commit
    /// this is a no-op.
    pub fn abort(&mut self) {
        let mut progress = self.progress.lock();
        match progress.cohort {
            CohortState::Committed => {
                warn!(txn = %self.id, "abort after commit ignored");
            }
            CohortState::Aborted => {}
            _ => {
                progress.cohort = CohortState::Aborted;
                progress.commit = CommitState::Aborted;
                self.staged = None;
                debug!(txn = %self.id, "cohort aborted");
            }
        }
    }

    /// Runs all three phases, aborting on the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing phase.
    pub async fn run(mut self) -> CoreResult<Revision> {
        let result = async {
            self.can_commit().await?;
            self.pre_commit().await?;
            self.commit().await
        }
        .await;
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn expect_state(&self, expected: CohortState, operation: &str) -> CoreResult<()> {
        let actual = self.state();
        if actual == expected {
            return Ok(());
        }
        Err(CoreError::invalid_state(format!(
            "{operation} requires cohort state {expected}, found {actual}"
        )))
    }

    /// Fails if a key under a written path changed behind this transaction.
    async fn check_written_paths(&self) -> CoreResult<()> {
        let mut prefixes: Vec<Vec<u8>> = self
            .log
            .operations()
            .iter()
            .map(|op| self.store.keys.encode(op.path()))
            .collect();
        prefixes.sort();
        prefixes.dedup_by(|later, earlier| later.starts_with(earlier.as_slice()));

        for prefix in &prefixes {
            let current = self
                .store
                .backend
                .range_revisions(prefix)
                .await
                .map_err(CoreError::from_backend)?;
            for entry in current {
                self.store.advance_revision(entry.mod_revision);
                let unchanged = match self.observations.revision(&entry.key) {
                    Some(seen) => seen == entry.mod_revision,
                    None => entry.mod_revision <= self.open_revision,
                };
                if !unchanged {
                    let key = self.describe(&entry.key);
                    warn!(
                        txn = %self.id,
                        key = %key,
                        opened = %self.open_revision,
                        modified = %entry.mod_revision,
                        "written path changed during can-commit"
                    );
                    return Err(CoreError::conflict(CommitPhase::CanCommit, key));
                }
            }
        }
        Ok(())
    }

    fn check_limits(&self, request: &TxnRequest) -> CoreResult<()> {
        let config = &self.store.config;
        let operations = request.op_count();
        if operations > config.max_txn_ops {
            return Err(CoreError::TransactionTooLarge {
                kind: SizeLimit::Operations,
                actual: operations,
                limit: config.max_txn_ops,
            });
        }
        let bytes = request.payload_len();
        if bytes > config.max_request_bytes {
            return Err(CoreError::TransactionTooLarge {
                kind: SizeLimit::Bytes,
                actual: bytes,
                limit: config.max_request_bytes,
            });
        }
        Ok(())
    }

    /// Renders a backend key as a path, or lossily if it is foreign.
    fn describe(&self, key: &[u8]) -> String {
        self.store.keys.decode(key).map_or_else(
            |_| String::from_utf8_lossy(key).into_owned(),
            |path| path.to_string(),
        )
    }
}

impl std::fmt::Debug for CommitCohort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitCohort")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("operations", &self.log.len())
            .field("open_revision", &self.open_revision)
            .field("staged", &self.staged.is_some())
            .finish()
    }
}

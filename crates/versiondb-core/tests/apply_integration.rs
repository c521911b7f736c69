//! Integration tests for the migrator's decision and transaction handling.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use versiondb_core::memory::{MemoryKeyBackend, MemoryStore, MemoryTx, DEFAULT_VERSION_KEY};
use versiondb_core::{
    Action, ApplyError, BoxError, DowngradePolicy, Migrator, MigratorConfig, Outcome, Phase,
    Registry, Scheme, Store, Transaction, VersionBackend,
};

const TABLE_KEY: &str = "schema/accounts";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SomeError(&'static str);

impl std::fmt::Display for SomeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SomeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Create,
    Update(u32),
}

/// Scheme double that records its callbacks and writes a marker key.
struct RecordingScheme {
    version: u32,
    strategy: &'static str,
    fail: Option<SomeError>,
    panic: bool,
    calls: RefCell<Vec<Call>>,
}

impl RecordingScheme {
    fn new(version: u32) -> Self {
        Self {
            version,
            strategy: "fake",
            fail: None,
            panic: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn with_strategy(mut self, strategy: &'static str) -> Self {
        self.strategy = strategy;
        self
    }

    fn failing(mut self, err: SomeError) -> Self {
        self.fail = Some(err);
        self
    }

    fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn run(&self, call: Call) -> Result<(), BoxError> {
        self.calls.borrow_mut().push(call);
        if self.panic {
            panic!("callback panicked");
        }
        match &self.fail {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }
}

impl Scheme<MemoryStore> for RecordingScheme {
    fn version(&self) -> u32 {
        self.version
    }

    fn strategy(&self) -> &str {
        self.strategy
    }

    fn on_create(&self, tx: &mut MemoryTx<'_>) -> Result<(), BoxError> {
        tx.insert(TABLE_KEY, format!("v{}", self.version));
        self.run(Call::Create)
    }

    fn on_update(&self, tx: &mut MemoryTx<'_>, old_version: u32) -> Result<(), BoxError> {
        tx.insert(TABLE_KEY, format!("v{}", self.version));
        self.run(Call::Update(old_version))
    }
}

/// Backend double that can fail either operation.
#[derive(Default)]
struct FailingBackend {
    inner: MemoryKeyBackend,
    fail_read: bool,
    fail_write: bool,
}

impl VersionBackend<MemoryStore> for FailingBackend {
    fn read_version(&self, tx: &mut MemoryTx<'_>) -> Result<u32, BoxError> {
        if self.fail_read {
            return Err(SomeError("read failed").into());
        }
        self.inner.read_version(tx)
    }

    fn write_version(&self, tx: &mut MemoryTx<'_>, version: u32) -> Result<(), BoxError> {
        if self.fail_write {
            return Err(SomeError("write failed").into());
        }
        self.inner.write_version(tx, version)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn migrator_with(
    backend: Arc<dyn VersionBackend<MemoryStore>>,
    config: MigratorConfig,
) -> Migrator<MemoryStore> {
    init_tracing();
    let registry = Arc::new(Registry::<MemoryStore>::new());
    registry.register("fake", backend);
    Migrator::with_config(registry, config)
}

fn migrator() -> Migrator<MemoryStore> {
    migrator_with(Arc::new(MemoryKeyBackend::default()), MigratorConfig::default())
}

fn store_at(version: u32) -> MemoryStore {
    let mut store = MemoryStore::new();
    if version > 0 {
        store.insert(DEFAULT_VERSION_KEY, version.to_string());
    }
    store
}

fn stored_version(store: &MemoryStore) -> Option<&str> {
    store
        .get(DEFAULT_VERSION_KEY)
        .map(|raw| std::str::from_utf8(raw).unwrap())
}

fn source_of(err: ApplyError) -> SomeError {
    *err.into_source().unwrap().downcast::<SomeError>().unwrap()
}

#[test]
fn test_scheme_creation() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1);

    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert_eq!(outcome, Outcome::Created { version: 1 });
    assert_eq!(scheme.calls(), vec![Call::Create]);
    assert_eq!(stored_version(&store), Some("1"));
    assert_eq!(store.get(TABLE_KEY), Some(b"v1".as_slice()));
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.rollback_count(), 0);
}

#[test]
fn test_apply_is_idempotent_once_current() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1);

    migrator.apply(&mut store, &scheme).unwrap();
    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert_eq!(
        outcome,
        Outcome::AlreadyCurrent {
            stored: 1,
            target: 1
        }
    );
    assert_eq!(scheme.calls(), vec![Call::Create]);
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_scheme_update() {
    let migrator = migrator();
    let mut store = store_at(1);
    let scheme = RecordingScheme::new(2);

    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert_eq!(outcome, Outcome::Updated { from: 1, to: 2 });
    assert_eq!(scheme.calls(), vec![Call::Update(1)]);
    assert_eq!(stored_version(&store), Some("2"));
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn test_update_skipping_versions_runs_once() {
    let migrator = migrator();
    let mut store = store_at(2);
    let scheme = RecordingScheme::new(5);

    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert_eq!(outcome, Outcome::Updated { from: 2, to: 5 });
    assert_eq!(scheme.calls(), vec![Call::Update(2)]);
    assert_eq!(stored_version(&store), Some("5"));
}

#[test]
fn test_scheme_up_to_date() {
    let migrator = migrator();
    let mut store = store_at(1);
    let scheme = RecordingScheme::new(1);

    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert!(!outcome.changed());
    assert!(scheme.calls().is_empty());
    assert_eq!(stored_version(&store), Some("1"));
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_zero_version_is_rejected_before_transaction() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(0);

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert!(matches!(err, ApplyError::InvalidVersion { version: 0 }));
    assert!(err.is_validation());
    assert!(scheme.calls().is_empty());
    assert!(store.is_empty());
    assert_eq!(store.commit_count() + store.rollback_count(), 0);
}

#[test]
fn test_unregistered_strategy() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1).with_strategy("not_registered");

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert!(matches!(err, ApplyError::UnknownStrategy { ref name } if name == "not_registered"));
    assert!(err.to_string().contains("not_registered"));
    assert!(scheme.calls().is_empty());
    assert_eq!(store.commit_count() + store.rollback_count(), 0);
}

#[test]
fn test_scheme_creation_error() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1).failing(SomeError("create failed"));

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert_eq!(err.phase(), Phase::Create);
    assert_eq!(source_of(err), SomeError("create failed"));
    assert_eq!(scheme.calls(), vec![Call::Create]);
    assert!(store.is_empty(), "callback writes must be rolled back");
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_scheme_update_error() {
    let migrator = migrator();
    let mut store = store_at(1);
    let scheme = RecordingScheme::new(2).failing(SomeError("update failed"));

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert!(matches!(err, ApplyError::Update { from: 1, to: 2, .. }));
    assert_eq!(source_of(err), SomeError("update failed"));
    assert_eq!(stored_version(&store), Some("1"));
    assert!(store.get(TABLE_KEY).is_none());
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_read_version_error() {
    let backend = FailingBackend {
        fail_read: true,
        ..Default::default()
    };
    let migrator = migrator_with(Arc::new(backend), MigratorConfig::default());
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1);

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert!(matches!(err, ApplyError::ReadVersion { ref strategy, .. } if strategy == "fake"));
    assert_eq!(source_of(err), SomeError("read failed"));
    assert!(scheme.calls().is_empty());
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_write_version_error_rolls_back_callback() {
    let backend = FailingBackend {
        fail_write: true,
        ..Default::default()
    };
    let migrator = migrator_with(Arc::new(backend), MigratorConfig::default());
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1);

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert!(matches!(err, ApplyError::WriteVersion { version: 1, .. }));
    assert_eq!(source_of(err), SomeError("write failed"));
    assert_eq!(scheme.calls(), vec![Call::Create]);
    assert!(store.is_empty());
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_panicking_callback_releases_transaction() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1).panicking();

    let result = catch_unwind(AssertUnwindSafe(|| migrator.apply(&mut store, &scheme)));

    assert!(result.is_err());
    assert!(store.is_empty());
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_downgrade_warn_is_current() {
    let migrator = migrator();
    let mut store = store_at(3);
    let scheme = RecordingScheme::new(2);

    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert_eq!(
        outcome,
        Outcome::AlreadyCurrent {
            stored: 3,
            target: 2
        }
    );
    assert_eq!(stored_version(&store), Some("3"));
}

#[test]
fn test_downgrade_ignore_is_current() {
    let config = MigratorConfig::new().with_downgrade(DowngradePolicy::Ignore);
    let migrator = migrator_with(Arc::new(MemoryKeyBackend::default()), config);
    let mut store = store_at(3);

    let outcome = migrator.apply(&mut store, &RecordingScheme::new(1)).unwrap();

    assert!(!outcome.changed());
}

#[test]
fn test_downgrade_reject() {
    let config = MigratorConfig::new().with_downgrade(DowngradePolicy::Reject);
    let migrator = migrator_with(Arc::new(MemoryKeyBackend::default()), config);
    let mut store = store_at(3);
    let scheme = RecordingScheme::new(2);

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert!(matches!(err, ApplyError::Downgrade { stored: 3, target: 2 }));
    assert_eq!(err.phase(), Phase::Decide);
    assert!(scheme.calls().is_empty());
    assert_eq!(stored_version(&store), Some("3"));
    assert_eq!(store.rollback_count(), 1);

    // Equal versions are never a downgrade.
    let outcome = migrator.apply(&mut store, &RecordingScheme::new(3)).unwrap();
    assert!(!outcome.changed());
}

#[test]
fn test_dry_run_rolls_back() {
    let config = MigratorConfig::new().with_dry_run(true);
    let migrator = migrator_with(Arc::new(MemoryKeyBackend::default()), config);
    let mut store = store_at(1);
    let scheme = RecordingScheme::new(2);

    let outcome = migrator.apply(&mut store, &scheme).unwrap();

    assert_eq!(outcome, Outcome::Updated { from: 1, to: 2 });
    assert_eq!(scheme.calls(), vec![Call::Update(1)]);
    assert_eq!(stored_version(&store), Some("1"));
    assert!(store.get(TABLE_KEY).is_none());
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_plan_runs_no_callbacks() {
    let migrator = migrator();
    let mut store = store_at(1);
    let scheme = RecordingScheme::new(4);

    let plan = migrator.plan(&mut store, &scheme).unwrap();

    assert_eq!(plan.strategy, "fake");
    assert_eq!(plan.stored_version, 1);
    assert_eq!(plan.target_version, 4);
    assert_eq!(plan.action, Action::Update { from: 1 });
    assert!(plan.needs_migration());
    assert!(scheme.calls().is_empty());
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);

    let plan = migrator.plan(&mut store_at(0), &scheme).unwrap();
    assert_eq!(plan.action, Action::Create);
}

#[test]
fn test_plan_validates_like_apply() {
    let migrator = migrator();
    let mut store = store_at(0);

    let err = migrator
        .plan(&mut store, &RecordingScheme::new(1).with_strategy("missing"))
        .unwrap_err();
    assert!(err.is_validation());

    let err = migrator.plan(&mut store, &RecordingScheme::new(0)).unwrap_err();
    assert!(matches!(err, ApplyError::InvalidVersion { .. }));
}

#[test]
fn test_plan_read_version_error_rolls_back() {
    let backend = FailingBackend {
        fail_read: true,
        ..Default::default()
    };
    let migrator = migrator_with(Arc::new(backend), MigratorConfig::default());
    let mut store = store_at(2);
    let scheme = RecordingScheme::new(3);

    let err = migrator.plan(&mut store, &scheme).unwrap_err();

    assert_eq!(err.phase(), Phase::ReadVersion);
    assert!(matches!(err, ApplyError::ReadVersion { ref strategy, .. } if strategy == "fake"));
    assert_eq!(source_of(err), SomeError("read failed"));
    assert!(scheme.calls().is_empty());
    assert_eq!(stored_version(&store), Some("2"));
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn test_apply_through_trait_object() {
    let migrator = migrator();
    let mut store = store_at(0);
    let scheme = RecordingScheme::new(1);
    let dyn_scheme: &dyn Scheme<MemoryStore> = &scheme;

    let outcome = migrator.apply(&mut store, dyn_scheme).unwrap();

    assert_eq!(outcome, Outcome::Created { version: 1 });
}

#[test]
fn test_schemes_share_store_under_separate_keys() {
    init_tracing();
    let registry = Arc::new(Registry::<MemoryStore>::new());
    registry.register("accounts", Arc::new(MemoryKeyBackend::new("version/accounts")));
    registry.register("billing", Arc::new(MemoryKeyBackend::new("version/billing")));
    let migrator = Migrator::new(registry);
    let mut store = MemoryStore::new();

    let accounts = RecordingScheme::new(2).with_strategy("accounts");
    let billing = RecordingScheme::new(1).with_strategy("billing");

    assert!(migrator.apply(&mut store, &accounts).unwrap().changed());
    assert!(migrator.apply(&mut store, &billing).unwrap().changed());

    assert_eq!(store.get("version/accounts"), Some(b"2".as_slice()));
    assert_eq!(store.get("version/billing"), Some(b"1".as_slice()));
}

/// Store double whose transactions fail to begin or to commit.
struct FlakyStore {
    inner: MemoryStore,
    fail_begin: bool,
}

struct FlakyTx<'a> {
    inner: MemoryTx<'a>,
}

impl Store for FlakyStore {
    type Tx<'a> = FlakyTx<'a>;

    fn begin(&mut self) -> Result<FlakyTx<'_>, BoxError> {
        if self.fail_begin {
            return Err(SomeError("store closed").into());
        }
        Ok(FlakyTx {
            inner: self.inner.begin()?,
        })
    }
}

impl Transaction for FlakyTx<'_> {
    fn commit(self) -> Result<(), BoxError> {
        self.inner.rollback()?;
        Err(SomeError("disk full").into())
    }

    fn rollback(self) -> Result<(), BoxError> {
        self.inner.rollback()
    }
}

struct FlakyBackend;

impl VersionBackend<FlakyStore> for FlakyBackend {
    fn read_version(&self, tx: &mut FlakyTx<'_>) -> Result<u32, BoxError> {
        MemoryKeyBackend::default().read_version(&mut tx.inner)
    }

    fn write_version(&self, tx: &mut FlakyTx<'_>, version: u32) -> Result<(), BoxError> {
        MemoryKeyBackend::default().write_version(&mut tx.inner, version)
    }
}

impl Scheme<FlakyStore> for RecordingScheme {
    fn version(&self) -> u32 {
        self.version
    }

    fn strategy(&self) -> &str {
        self.strategy
    }

    fn on_create(&self, tx: &mut FlakyTx<'_>) -> Result<(), BoxError> {
        tx.inner.insert(TABLE_KEY, "created");
        self.run(Call::Create)
    }

    fn on_update(&self, _tx: &mut FlakyTx<'_>, old_version: u32) -> Result<(), BoxError> {
        self.run(Call::Update(old_version))
    }
}

fn flaky_migrator() -> Migrator<FlakyStore> {
    init_tracing();
    let registry = Arc::new(Registry::<FlakyStore>::new());
    registry.register("fake", Arc::new(FlakyBackend));
    Migrator::new(registry)
}

#[test]
fn test_commit_error() {
    let migrator = flaky_migrator();
    let mut store = FlakyStore {
        inner: MemoryStore::new(),
        fail_begin: false,
    };
    let scheme = RecordingScheme::new(1);

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert_eq!(err.phase(), Phase::Commit);
    assert_eq!(source_of(err), SomeError("disk full"));
    assert_eq!(scheme.calls(), vec![Call::Create]);
    assert!(store.inner.is_empty());
}

#[test]
fn test_begin_error() {
    let migrator = flaky_migrator();
    let mut store = FlakyStore {
        inner: MemoryStore::new(),
        fail_begin: true,
    };
    let scheme = RecordingScheme::new(1);

    let err = migrator.apply(&mut store, &scheme).unwrap_err();

    assert_eq!(err.phase(), Phase::Begin);
    assert_eq!(source_of(err), SomeError("store closed"));
    assert!(scheme.calls().is_empty());
}

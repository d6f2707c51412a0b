//! Shared test utilities for forma-operator integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use forma_operator::account::{Account, AccountSpec, AccountState, ObjectKey};
use forma_operator::reconciler::{AccountReconciler, Action, Reconciler};
use forma_operator::remote::{self, AccountClient, CreateAccountRequest, RemoteAccount};
use forma_operator::rest::{AppState, create_router};
use forma_operator::store::{self, AccountStore, MemoryStore, StoreError, StoreEvent};
use forma_operator::{
    AccountAuditLogger, Controller, ControllerConfig, MemoryAccountClient, RetryPolicy,
};
use reqwest::{Client, Response as ReqwestResponse};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Allocate an available port for testing.
pub fn allocate_port() -> u16 {
    portpicker::pick_unused_port().expect("No available port")
}

/// The org-1 / GB account used throughout the scenarios.
pub fn gb_spec() -> AccountSpec {
    AccountSpec {
        organisation_id: "org-1".to_string(),
        country: "GB".to_string(),
        bank_id: "400300".to_string(),
        bank_id_code: "GBDSC".to_string(),
        bic: "NWBKGB22".to_string(),
    }
}

pub fn audit() -> Arc<AccountAuditLogger> {
    Arc::new(AccountAuditLogger::new("test"))
}

/// Retry quickly so controller tests settle fast.
pub fn fast_config() -> ControllerConfig {
    ControllerConfig {
        workers: 2,
        resync_interval: None,
        retry: RetryPolicy {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_attempts: Some(5),
        },
    }
}

/// Poll `check` until it returns `Some`, panicking after `timeout`.
pub async fn eventually<T, F, Fut>(timeout: Duration, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Store, remote client and reconciler wired together without a controller.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub client: Arc<MemoryAccountClient>,
    pub reconciler: AccountReconciler,
    pub shutdown_tx: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(MemoryAccountClient::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconciler = AccountReconciler::new(
            store.clone(),
            client.clone(),
            audit(),
            shutdown_rx,
        );
        Self {
            store,
            client,
            reconciler,
            shutdown_tx,
        }
    }

    pub async fn create(&self, name: &str) -> ObjectKey {
        self.store
            .create(Account::new("default", name, gb_spec()))
            .await
            .expect("Failed to create account")
            .key()
    }

    pub async fn get(&self, key: &ObjectKey) -> Option<Account> {
        self.store.get(key).await.expect("Store read failed")
    }

    pub async fn reconcile(&self, key: &ObjectKey) -> Action {
        self.reconciler
            .reconcile(key)
            .await
            .expect("Reconcile failed")
    }

    /// Create an account and drive it to `Ready` with remote id `id`.
    pub async fn ready(&self, name: &str, id: &str) -> ObjectKey {
        let key = self.create(name).await;
        self.client.push_next_id(id);
        assert_eq!(self.reconcile(&key).await, Action::Requeue);
        assert_eq!(self.reconcile(&key).await, Action::Done);
        let account = self.get(&key).await.expect("Account missing");
        assert_eq!(account.status.state, AccountState::Ready);
        key
    }
}

/// Account service whose calls never finish on their own.
pub struct HangingClient;

#[async_trait]
impl AccountClient for HangingClient {
    async fn create_account(&self, _req: &CreateAccountRequest) -> remote::Result<RemoteAccount> {
        std::future::pending().await
    }

    async fn delete_account(&self, _id: &str) -> remote::Result<()> {
        std::future::pending().await
    }
}

/// Store that fails planned writes with a version conflict.
///
/// Each planned entry covers one write of that kind, in order: `true`
/// conflicts, `false` passes through. Writes past the plan pass through.
#[derive(Default)]
pub struct ConflictingStore {
    inner: MemoryStore,
    update_plan: Mutex<VecDeque<bool>>,
    status_plan: Mutex<VecDeque<bool>>,
}

impl ConflictingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_updates(&self, plan: &[bool]) {
        *self.update_plan.lock().unwrap() = plan.iter().copied().collect();
    }

    pub fn plan_status_writes(&self, plan: &[bool]) {
        *self.status_plan.lock().unwrap() = plan.iter().copied().collect();
    }

    fn conflict(plan: &Mutex<VecDeque<bool>>, account: &Account) -> Option<StoreError> {
        let conflict = plan.lock().unwrap().pop_front().unwrap_or(false);
        conflict.then(|| {
            let version = account.metadata.resource_version;
            StoreError::Conflict {
                key: account.key().to_string(),
                expected: version + 1,
                actual: version,
            }
        })
    }
}

#[async_trait]
impl AccountStore for ConflictingStore {
    async fn get(&self, key: &ObjectKey) -> store::Result<Option<Account>> {
        self.inner.get(key).await
    }

    async fn list(&self) -> store::Result<Vec<Account>> {
        self.inner.list().await
    }

    async fn list_namespace(&self, namespace: &str) -> store::Result<Vec<Account>> {
        self.inner.list_namespace(namespace).await
    }

    async fn create(&self, account: Account) -> store::Result<Account> {
        self.inner.create(account).await
    }

    async fn update(&self, account: Account) -> store::Result<Account> {
        if let Some(e) = Self::conflict(&self.update_plan, &account) {
            return Err(e);
        }
        self.inner.update(account).await
    }

    async fn update_status(&self, account: Account) -> store::Result<Account> {
        if let Some(e) = Self::conflict(&self.status_plan, &account) {
            return Err(e);
        }
        self.inner.update_status(account).await
    }

    async fn delete(&self, key: &ObjectKey) -> store::Result<()> {
        self.inner.delete(key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

/// Account service that requests deletion of `key` while a create is in
/// flight, as a user racing the reconciler would.
pub struct DeleteDuringCreate {
    pub store: Arc<MemoryStore>,
    pub key: ObjectKey,
    pub inner: MemoryAccountClient,
}

#[async_trait]
impl AccountClient for DeleteDuringCreate {
    async fn create_account(&self, req: &CreateAccountRequest) -> remote::Result<RemoteAccount> {
        self.store.delete(&self.key).await.unwrap();
        self.inner.create_account(req).await
    }

    async fn delete_account(&self, id: &str) -> remote::Result<()> {
        self.inner.delete_account(id).await
    }
}

/// Controller running against an in-memory store and account service.
pub struct TestController {
    pub store: Arc<MemoryStore>,
    pub client: Arc<MemoryAccountClient>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TestController {
    pub fn spawn(config: ControllerConfig) -> Self {
        Self::spawn_with(Arc::new(MemoryStore::new()), config)
    }

    /// Start a controller over a store that may already hold objects.
    pub fn spawn_with(store: Arc<MemoryStore>, config: ControllerConfig) -> Self {
        let client = Arc::new(MemoryAccountClient::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconciler = Arc::new(AccountReconciler::new(
            store.clone(),
            client.clone(),
            audit(),
            shutdown_rx.clone(),
        ));
        let controller = Controller::new(reconciler, store.clone(), config);
        let task = tokio::spawn(controller.run(shutdown_rx));
        Self {
            store,
            client,
            shutdown_tx,
            task,
        }
    }

    pub async fn state_of(&self, key: &ObjectKey) -> Option<AccountState> {
        self.store
            .get(key)
            .await
            .expect("Store read failed")
            .map(|a| a.status.state)
    }

    /// Wait until `key` reaches `expected`; `None` means removed from the store.
    pub async fn wait_for(&self, key: &ObjectKey, expected: Option<AccountState>) {
        eventually(Duration::from_secs(5), move || async move {
            (self.state_of(key).await == expected).then_some(())
        })
        .await
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("Controller did not stop")
            .expect("Controller task panicked");
    }
}

/// Test server wrapper serving the REST API, optionally with a controller.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub accounts: Option<Arc<MemoryAccountClient>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    controller: Option<TestController>,
}

impl TestServer {
    /// Spawn the REST API alone; nothing reconciles the objects.
    pub async fn spawn() -> Self {
        Self::start(Arc::new(MemoryStore::new()), None).await
    }

    /// Spawn the REST API in front of a running controller.
    pub async fn spawn_with_controller() -> Self {
        let controller = TestController::spawn(fast_config());
        Self::start(controller.store.clone(), Some(controller)).await
    }

    async fn start(store: Arc<MemoryStore>, controller: Option<TestController>) -> Self {
        let router = create_router(Arc::new(AppState {
            store: store.clone(),
        }));

        let addr: SocketAddr = format!("127.0.0.1:{}", allocate_port()).parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr: actual_addr,
            client: Client::new(),
            store,
            accounts: controller.as_ref().map(|c| c.client.clone()),
            shutdown_tx,
            controller,
        }
    }

    /// Get base URL for the REST API.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Perform a GET request.
    pub async fn get(&self, path: &str) -> ReqwestResponse {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Perform a PUT request with JSON body.
    pub async fn put_json<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .put(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Perform a DELETE request.
    pub async fn delete(&self, path: &str) -> ReqwestResponse {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Some(controller) = self.controller {
            controller.shutdown().await;
        }
    }
}

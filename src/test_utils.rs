//! Test utilities for place-harvester
//!
//! Scripted fakes for the automation, task source and document store
//! boundaries, so the worker and the orchestrator run without a browser or a
//! database. Every fake counts how often its resources are acquired and
//! released.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::domain::record::ExtractedRecord;
use crate::domain::repositories::{CompletionLedger, DocumentStore, RecordSink, StoreConnector, TaskSource};
use crate::domain::task::Task;
use crate::infrastructure::automation::{
    AutomationError, AutomationResult, BrowserSession, SessionConfig, SessionFactory,
};
use crate::infrastructure::parsing::{PageSelectors, StateSchema};

/// Embedded state of a complete place detail view (average main price 24,500)
pub fn sample_state() -> Value {
    json!({
        "PlaceDetailBase:1658029392": {
            "__typename": "PlaceDetailBase",
            "name": "토속촌 삼계탕",
            "visitorReviewsTotal": "12,345",
            "visitorReviewsScore": 4.42
        },
        "Menu:1658029392_0": { "__typename": "Menu", "name": "삼계탕", "price": "20,000" },
        "Menu:1658029392_1": { "__typename": "Menu", "name": "오골계 삼계탕", "price": "29000" },
        "Menu:1658029392_2": { "__typename": "Menu", "name": "전기구이 통닭", "price": "" },
        "Menu:1658029392_3": { "__typename": "Menu", "name": "단체 코스", "price": "150,000" },
        "ROOT_QUERY": {
            "__typename": "Query",
            "fsasReviews({\"input\":{\"businessId\":\"1658029392\"}})": {
                "__typename": "FsasReviewsResult",
                "total": "3,210"
            }
        }
    })
}

/// How the fake site behaves for one searched name
#[derive(Debug, Clone)]
pub struct FakePage {
    pub search_loads: bool,
    pub entries: Vec<Option<String>>,
    pub detail_attaches: bool,
    pub state: Value,
    pub panic_on_read: bool,
    pub navigation_delay: Duration,
    pub ready_poll_errors: usize,
}

impl FakePage {
    /// Search shows one result whose detail view carries `state`
    pub fn found(state: Value) -> Self {
        Self {
            search_loads: true,
            entries: vec![Some("서울 종로구".to_string())],
            detail_attaches: true,
            state,
            panic_on_read: false,
            navigation_delay: Duration::ZERO,
            ready_poll_errors: 0,
        }
    }

    pub fn search_never_loads() -> Self {
        Self {
            search_loads: false,
            ..Self::found(Value::Null)
        }
    }

    pub fn detail_never_attaches() -> Self {
        Self {
            detail_attaches: false,
            ..Self::found(Value::Null)
        }
    }

    pub fn with_entries(mut self, fragments: &[&str]) -> Self {
        self.entries = fragments.iter().map(|f| Some((*f).to_string())).collect();
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_read = true;
        self
    }

    /// Page load that never returns within any harvest bound
    pub fn navigation_hangs(mut self) -> Self {
        self.navigation_delay = Duration::from_secs(600);
        self
    }

    /// First `count` readiness polls fail like a detached execution context
    pub fn with_ready_poll_errors(mut self, count: usize) -> Self {
        self.ready_poll_errors = count;
        self
    }
}

/// Counters shared by every session of one factory
#[derive(Debug, Default)]
pub struct SessionProbe {
    opened: AtomicUsize,
    closed: AtomicUsize,
    navigations: AtomicUsize,
    clicked: Mutex<Vec<usize>>,
    navigated: Mutex<Vec<String>>,
}

impl SessionProbe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    /// Entry indices clicked, in order
    pub fn clicked(&self) -> Vec<usize> {
        self.clicked.lock().unwrap().clone()
    }

    /// URLs navigated to, in order
    pub fn navigated(&self) -> Vec<String> {
        self.navigated.lock().unwrap().clone()
    }
}

/// Opens [`FakeSession`]s over a fixed set of pages keyed by searched name
#[derive(Debug, Clone, Default)]
pub struct FakeSessionFactory {
    pages: Arc<HashMap<String, FakePage>>,
    probe: Arc<SessionProbe>,
    fail_open: bool,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, name: &str, page: FakePage) -> Self {
        let mut pages = (*self.pages).clone();
        pages.insert(name.to_string(), page);
        self.pages = Arc::new(pages);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn probe(&self) -> Arc<SessionProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, _config: &SessionConfig) -> AutomationResult<Box<dyn BrowserSession>> {
        if self.fail_open {
            return Err(AutomationError::Launch("no browser available".to_string()));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pages: Arc::clone(&self.pages),
            probe: Arc::clone(&self.probe),
            current: None,
            selectors: PageSelectors::default(),
            schema: StateSchema::default(),
        }))
    }
}

/// Scripted browser session
pub struct FakeSession {
    pages: Arc<HashMap<String, FakePage>>,
    probe: Arc<SessionProbe>,
    current: Option<FakePage>,
    selectors: PageSelectors,
    schema: StateSchema,
}

impl FakeSession {
    fn page(&self) -> AutomationResult<&FakePage> {
        self.current
            .as_ref()
            .ok_or_else(|| AutomationError::Navigation("no page loaded".to_string()))
    }

    /// Last path segment as it appears in a search URL for `name`
    fn encoded_segment(name: &str) -> String {
        let mut url = Url::parse("http://fake/").unwrap();
        url.path_segments_mut().unwrap().pop_if_empty().push(name);
        url.path().trim_start_matches('/').to_string()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> AutomationResult<()> {
        self.probe.navigations.fetch_add(1, Ordering::SeqCst);
        self.probe.navigated.lock().unwrap().push(url.to_string());

        self.current = self
            .pages
            .iter()
            .find(|(name, _)| url.ends_with(&format!("/{}", Self::encoded_segment(name))))
            .map(|(_, page)| page.clone());

        match &self.current {
            Some(page) => {
                tokio::time::sleep(page.navigation_delay).await;
                Ok(())
            }
            None => Err(AutomationError::Navigation(format!("unknown page: {url}"))),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> AutomationResult<()> {
        if !self.page()?.entries.is_empty() {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(AutomationError::timeout(selector, timeout))
    }

    async fn switch_frame(&mut self, selector: &str, timeout: Duration) -> AutomationResult<()> {
        let page = self.page()?;
        let attaches = if selector == self.selectors.search_frame {
            page.search_loads
        } else if selector == self.selectors.detail_frame {
            page.detail_attaches
        } else {
            false
        };

        if attaches {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(AutomationError::timeout(selector, timeout))
    }

    async fn switch_default(&mut self) -> AutomationResult<()> {
        Ok(())
    }

    async fn entry_texts(
        &mut self,
        _entries: &str,
        _child: &str,
        limit: usize,
    ) -> AutomationResult<Vec<Option<String>>> {
        Ok(self.page()?.entries.iter().take(limit).cloned().collect())
    }

    async fn click_entry(&mut self, _entries: &str, index: usize, _child: &str) -> AutomationResult<bool> {
        let exists = index < self.page()?.entries.len();
        self.probe.clicked.lock().unwrap().push(index);
        Ok(exists)
    }

    async fn run_script(&mut self, expression: &str) -> AutomationResult<Value> {
        if expression == self.schema.ready_expression() {
            if let Some(page) = self.current.as_mut().filter(|page| page.ready_poll_errors > 0) {
                page.ready_poll_errors -= 1;
                return Err(AutomationError::Script("Cannot find context with specified id".to_string()));
            }
        }

        let page = self.page()?;
        if expression == self.schema.ready_expression() {
            let ready = page.state.as_object().is_some_and(|state| !state.is_empty());
            return Ok(Value::Bool(ready));
        }
        if expression == self.schema.read_expression() {
            assert!(!page.panic_on_read, "embedded state read blew up");
            return Ok(page.state.clone());
        }
        Ok(Value::Null)
    }

    async fn close(self: Box<Self>) -> AutomationResult<()> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counters shared by every connection of one connector
#[derive(Debug, Default)]
pub struct StoreProbe {
    connects: AtomicUsize,
    closes: AtomicUsize,
    upserts: AtomicUsize,
}

impl StoreProbe {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

type Documents = Arc<Mutex<HashMap<String, ExtractedRecord>>>;

/// Document store kept in memory, shared by every connection
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    documents: Documents,
    probe: Arc<StoreProbe>,
    fail_connect: bool,
    fail_ledger: bool,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_ledger(mut self) -> Self {
        self.fail_ledger = true;
        self
    }

    pub fn probe(&self) -> Arc<StoreProbe> {
        Arc::clone(&self.probe)
    }

    pub fn document(&self, identifier: &str) -> Option<ExtractedRecord> {
        self.documents.lock().unwrap().get(identifier).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
        if self.fail_connect {
            return Err(anyhow!("connection refused"));
        }
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryStore {
            documents: Arc::clone(&self.documents),
            probe: Arc::clone(&self.probe),
            fail_ledger: self.fail_ledger,
        }))
    }
}

pub struct InMemoryStore {
    documents: Documents,
    probe: Arc<StoreProbe>,
    fail_ledger: bool,
}

#[async_trait]
impl CompletionLedger for InMemoryStore {
    async fn known_identifiers(&mut self) -> Result<HashSet<String>> {
        if self.fail_ledger {
            return Err(anyhow!("ledger unreadable"));
        }
        Ok(self.documents.lock().unwrap().keys().cloned().collect())
    }
}

#[async_trait]
impl RecordSink for InMemoryStore {
    async fn upsert(&mut self, identifier: &str, record: &ExtractedRecord) -> Result<()> {
        self.probe.upserts.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .insert(identifier.to_string(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn close(self: Box<Self>) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Task source returning a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSource {
    tasks: Vec<Task>,
    fail: bool,
}

impl StaticTaskSource {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks, fail: false }
    }

    pub fn unreachable() -> Self {
        Self {
            tasks: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl TaskSource for StaticTaskSource {
    async fn list_open_tasks(&self) -> Result<Vec<Task>> {
        if self.fail {
            return Err(anyhow!("task source unreachable"));
        }
        Ok(self.tasks.clone())
    }
}

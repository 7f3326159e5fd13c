//! Harvest worker: one task, one browser session, one store connection
//!
//! The worker walks the navigation state machine
//! `Init → SearchLoaded → Disambiguated → DetailFrameLoaded → StateExtracted`
//! and always ends in exactly one [`TaskOutcome`]. Errors and panics are
//! converted at the task boundary; the session and the store connection are
//! released on every exit path.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn, Instrument};
use url::Url;

use super::errors::{HarvestError, HarvestResult};
use crate::domain::address::{extract_token, select_candidate_within, FALLBACK_INDEX};
use crate::domain::record::{ExtractedRecord, HarvestStatus, PlaceDetail};
use crate::domain::repositories::{DocumentStore, StoreConnector};
use crate::domain::task::Task;
use crate::infrastructure::automation::{wait_until_truthy, AutomationError, BrowserSession, SessionConfig, SessionFactory};
use crate::infrastructure::config::{AppConfig, HarvestConfig};
use crate::infrastructure::parsing::{PageSelectors, PlaceDetailParser, StateParser};

const STATE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Everything a worker needs besides the task itself
pub struct WorkerSettings {
    pub session: SessionConfig,
    pub harvest: HarvestConfig,
    pub selectors: PageSelectors,
    pub parser: PlaceDetailParser,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session: config.browser.clone(),
            harvest: config.harvest.clone(),
            selectors: config.selectors.clone(),
            parser: PlaceDetailParser::new(config.state.clone()),
        }
    }
}

/// Shared, read-only worker dependencies
#[derive(Clone)]
pub struct WorkerContext {
    pub sessions: Arc<dyn SessionFactory>,
    pub stores: Arc<dyn StoreConnector>,
    pub settings: Arc<WorkerSettings>,
}

impl WorkerContext {
    pub fn new(sessions: Arc<dyn SessionFactory>, stores: Arc<dyn StoreConnector>, settings: WorkerSettings) -> Self {
        Self {
            sessions,
            stores,
            settings: Arc::new(settings),
        }
    }
}

/// Result of one task, successful or not
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub record: ExtractedRecord,
    pub elapsed: Duration,
}

impl TaskOutcome {
    pub fn identifier(&self) -> &str {
        &self.record.original_name
    }

    pub fn status(&self) -> HarvestStatus {
        self.record.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.record.reason.as_deref()
    }
}

/// 네비게이션 상태
#[derive(Debug)]
enum NavState {
    Init,
    SearchLoaded,
    Disambiguated { index: usize },
    DetailFrameLoaded,
    StateExtracted { state: Value },
}

impl NavState {
    fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::SearchLoaded => "search_loaded",
            Self::Disambiguated { .. } => "disambiguated",
            Self::DetailFrameLoaded => "detail_frame_loaded",
            Self::StateExtracted { .. } => "state_extracted",
        }
    }
}

/// Run one task to its outcome. Never fails, never panics.
pub async fn run_task(context: &WorkerContext, task: Task) -> TaskOutcome {
    let started = Instant::now();
    let span = tracing::info_span!("task", original_name = %task.original_name);

    let result = AssertUnwindSafe(harvest_with_resources(context, &task))
        .catch_unwind()
        .instrument(span)
        .await
        .unwrap_or_else(|payload| Err(HarvestError::from_panic(payload)));

    let record = match result {
        Ok(record) => record,
        Err(error) => {
            debug!("Task '{}' ended with {}: {}", task.original_name, error.status(), error);
            ExtractedRecord::unsuccessful(&task, error.status(), error.reason())
        }
    };

    TaskOutcome {
        record,
        elapsed: started.elapsed(),
    }
}

/// Acquire the task's session and store connection, run it, release both
async fn harvest_with_resources(context: &WorkerContext, task: &Task) -> HarvestResult<ExtractedRecord> {
    let settings = &context.settings;

    let mut session = context
        .sessions
        .open(&settings.session)
        .await
        .map_err(HarvestError::connectivity)?;

    let mut store = match context.stores.connect().await {
        Ok(store) => store,
        Err(e) => {
            release_session(session).await;
            return Err(HarvestError::connectivity(format!("{:#}", e)));
        }
    };

    let result = AssertUnwindSafe(harvest(&mut *session, &mut *store, settings, task))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(HarvestError::from_panic(payload)));

    release_session(session).await;
    if let Err(e) = store.close().await {
        warn!("Store connection did not close cleanly: {:#}", e);
    }

    result
}

async fn release_session(session: Box<dyn BrowserSession>) {
    if let Err(e) = session.close().await {
        warn!("Browser session did not close cleanly: {}", e);
    }
}

async fn harvest(
    session: &mut dyn BrowserSession,
    store: &mut dyn DocumentStore,
    settings: &WorkerSettings,
    task: &Task,
) -> HarvestResult<ExtractedRecord> {
    let detail = navigate_and_extract(session, settings, task).await?;
    let record = ExtractedRecord::success(task, detail);

    store
        .upsert(&task.original_name, &record)
        .await
        .map_err(|e| HarvestError::store(&e))?;

    Ok(record)
}

/// Drive the navigation state machine until the embedded state is parsed
async fn navigate_and_extract(
    session: &mut dyn BrowserSession,
    settings: &WorkerSettings,
    task: &Task,
) -> HarvestResult<PlaceDetail> {
    let mut state = NavState::Init;

    loop {
        state = match state {
            NavState::Init => {
                let url = search_url(&settings.harvest.search_url_base, task.normalized_name())?;
                load_search(session, settings, url.as_str()).await?;
                NavState::SearchLoaded
            }
            NavState::SearchLoaded => {
                let index = disambiguate(session, settings, task).await?;
                NavState::Disambiguated { index }
            }
            NavState::Disambiguated { index } => {
                open_detail(session, settings, index).await?;
                NavState::DetailFrameLoaded
            }
            NavState::DetailFrameLoaded => {
                let state = read_state(session, settings).await?;
                NavState::StateExtracted { state }
            }
            NavState::StateExtracted { state } => {
                return Ok(settings.parser.parse(&state)?);
            }
        };
        debug!("→ {}", state.name());
    }
}

/// Search URL for a normalized name (one percent-encoded path segment)
pub fn search_url(base: &str, name: &str) -> HarvestResult<Url> {
    let invalid = || AutomationError::Navigation(format!("invalid search URL base: {}", base));

    let mut url = Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(name);
    Ok(url)
}

/// Page load and search frame share one navigation bound
async fn load_search(session: &mut dyn BrowserSession, settings: &WorkerSettings, url: &str) -> HarvestResult<()> {
    let selectors = &settings.selectors;
    let bound = settings.harvest.navigation_timeout();

    let loaded = tokio::time::timeout(bound, async {
        session.navigate(url).await?;
        session.switch_frame(&selectors.search_frame, bound).await
    })
    .await
    .unwrap_or_else(|_| Err(AutomationError::timeout(url, bound)));
    loaded.map_err(|e| timeout_as(e, HarvestError::NavigationTimeout))?;

    session
        .wait_for(&selectors.result_entry, settings.harvest.candidate_wait())
        .await
        .map_err(|e| timeout_as(e, HarvestError::NavigationTimeout))?;

    Ok(())
}

/// Index of the search result to open
async fn disambiguate(session: &mut dyn BrowserSession, settings: &WorkerSettings, task: &Task) -> HarvestResult<usize> {
    let Some(token) = task.address().and_then(extract_token) else {
        debug!("No locale token in address, taking first result");
        return Ok(FALLBACK_INDEX);
    };

    let selectors = &settings.selectors;
    let limit = settings.harvest.candidate_limit;
    let fragments = session
        .entry_texts(&selectors.result_entry, &selectors.result_address, limit)
        .await?;

    let index = select_candidate_within(Some(token), &fragments, limit);
    debug!("Locale token '{}' → result #{} of {}", token, index + 1, fragments.len());
    Ok(index)
}

async fn open_detail(session: &mut dyn BrowserSession, settings: &WorkerSettings, index: usize) -> HarvestResult<()> {
    let selectors = &settings.selectors;

    let clicked = session
        .click_entry(&selectors.result_entry, index, &selectors.result_link)
        .await?;
    if !clicked {
        return Err(HarvestError::NavigationTimeout(format!("search result #{} has no link", index + 1)));
    }

    tokio::time::sleep(settings.harvest.settle_delay()).await;

    session.switch_default().await?;
    session
        .switch_frame(&selectors.detail_frame, settings.harvest.frame_timeout())
        .await
        .map_err(|e| timeout_as(e, HarvestError::FrameNotFound))?;

    Ok(())
}

async fn read_state(session: &mut dyn BrowserSession, settings: &WorkerSettings) -> HarvestResult<Value> {
    let schema = settings.parser.schema();

    match wait_until_truthy(
        session,
        &schema.ready_expression(),
        settings.harvest.frame_timeout(),
        STATE_POLL_INTERVAL,
    )
    .await
    {
        Ok(()) => {}
        // 준비되지 않아도 일단 읽어본다
        Err(e) if e.is_timeout() => debug!("Embedded state not ready, reading anyway"),
        Err(e) => return Err(e.into()),
    }

    Ok(session.run_script(&schema.read_expression()).await?)
}

fn timeout_as(error: AutomationError, kind: fn(String) -> HarvestError) -> HarvestError {
    match error {
        AutomationError::Timeout { target, .. } => kind(target),
        other => other.into(),
    }
}

//! End-to-end harvest passes against scripted browser sessions
use std::sync::Arc;
use std::time::Duration;

use place_harvester::application::{Orchestrator, WorkerContext, WorkerSettings};
use place_harvester::domain::{CompletionLedger, HarvestStatus, StoreConnector, Task};
use place_harvester::infrastructure::{AppConfig, DocumentStoreConfig, SqliteStoreConnector};
use place_harvester::test_utils::{sample_state, FakePage, FakeSessionFactory, InMemoryConnector, StaticTaskSource};
use tempfile::TempDir;

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.harvest.workers = 2;
    config.harvest.settle_delay_ms = 0;
    config.harvest.navigation_timeout_secs = 1;
    config.harvest.candidate_wait_secs = 1;
    config.harvest.frame_timeout_secs = 1;
    config
}

fn orchestrator(
    tasks: Vec<Task>,
    sessions: &FakeSessionFactory,
    stores: Arc<dyn StoreConnector>,
) -> Orchestrator {
    let context = WorkerContext::new(
        Arc::new(sessions.clone()),
        stores,
        WorkerSettings::from_config(&fast_config()),
    );
    Orchestrator::new(Arc::new(StaticTaskSource::new(tasks)), context)
}

fn sqlite_connector(dir: &TempDir) -> SqliteStoreConnector {
    SqliteStoreConnector::new(DocumentStoreConfig {
        database_url: format!("sqlite://{}", dir.path().join("places.db").display()),
        collection: "restaurant".to_string(),
    })
}

fn site() -> FakeSessionFactory {
    FakeSessionFactory::new()
        .with_page("할매국밥", FakePage::found(sample_state()))
        .with_page("토속촌", FakePage::found(sample_state()))
        .with_page("문닫은집", FakePage::detail_never_attaches())
}

fn tasks() -> Vec<Task> {
    vec![
        Task::new("할매국밥", None),
        Task::new("\"토속촌\"", Some("서울 종로구 체부동 85-1".to_string())),
        Task::new("문닫은집", None),
    ]
}

#[tokio::test]
async fn second_run_skips_harvested_places() {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(sqlite_connector(&dir));

    let first_site = site();
    let first = orchestrator(tasks(), &first_site, connector.clone()).run().await.unwrap();
    assert_eq!(first.succeeded(), 2);
    assert_eq!(first.failed(), 1);

    let second_site = site();
    let second = orchestrator(tasks(), &second_site, connector.clone()).run().await.unwrap();

    // 실패한 작업만 다시 시도
    assert_eq!(second.skipped, 2);
    assert_eq!(second.outcomes.len(), 1);
    assert_eq!(second.outcomes[0].identifier(), "문닫은집");
    assert_eq!(second_site.probe().navigations(), 1);
    assert_eq!(
        second_site.probe().navigated(),
        vec!["https://map.naver.com/p/search/%EB%AC%B8%EB%8B%AB%EC%9D%80%EC%A7%91".to_string()]
    );

    let mut store = connector.connect().await.unwrap();
    let known = store.known_identifiers().await.unwrap();
    store.close().await.unwrap();
    assert_eq!(known.len(), 2);
    assert!(known.contains("할매국밥"));
    assert!(known.contains("\"토속촌\""));
}

#[tokio::test]
async fn slow_search_does_not_block_siblings() {
    let sessions = FakeSessionFactory::new()
        .with_page("느린집", FakePage::search_never_loads())
        .with_page("a", FakePage::found(sample_state()))
        .with_page("b", FakePage::found(sample_state()))
        .with_page("c", FakePage::found(sample_state()));
    let stores = InMemoryConnector::new();
    let tasks = vec![
        Task::new("느린집", None),
        Task::new("a", None),
        Task::new("b", None),
        Task::new("c", None),
    ];

    let report = orchestrator(tasks, &sessions, Arc::new(stores.clone())).run().await.unwrap();

    assert_eq!(report.outcomes.len(), 4);
    let slow = report.outcomes.last().unwrap();
    assert_eq!(slow.identifier(), "느린집");
    assert_eq!(slow.status(), HarvestStatus::Fail);
    assert_eq!(slow.reason(), Some("navigation timeout"));

    for outcome in &report.outcomes[..3] {
        assert_eq!(outcome.status(), HarvestStatus::Success);
        assert!(outcome.elapsed < Duration::from_secs(1));
    }
    assert_eq!(stores.document_count(), 3);
}

#[tokio::test]
async fn every_outcome_releases_its_resources_once() {
    let sessions = FakeSessionFactory::new()
        .with_page("ok", FakePage::found(sample_state()))
        .with_page("no-frame", FakePage::detail_never_attaches())
        .with_page("bad-state", FakePage::found(serde_json::json!({ "x": 1 })))
        .with_page("boom", FakePage::found(sample_state()).panicking());
    let stores = InMemoryConnector::new();
    let tasks = vec![
        Task::new("ok", None),
        Task::new("no-frame", None),
        Task::new("bad-state", None),
        Task::new("boom", None),
        Task::new("not-on-site", None),
    ];

    let report = orchestrator(tasks, &sessions, Arc::new(stores.clone())).run().await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.errored(), 2);

    let session_probe = sessions.probe();
    assert_eq!(session_probe.opened(), 5);
    assert_eq!(session_probe.closed(), 5);

    // 작업별 연결 5개 + 완료 목록 조회 1개
    let store_probe = stores.probe();
    assert_eq!(store_probe.connects(), 6);
    assert_eq!(store_probe.closes(), 6);
    assert_eq!(store_probe.upserts(), 1);
}

#[tokio::test]
async fn address_token_picks_matching_result() {
    let entries = ["중구 명동", "종로구 관철동", "종로구 체부동", "마포구 합정동", "강남구 역삼동"];
    let sessions = FakeSessionFactory::new()
        .with_page("토속촌", FakePage::found(sample_state()).with_entries(&entries))
        .with_page("체인점", FakePage::found(sample_state()).with_entries(&entries));
    let stores = InMemoryConnector::new();
    let tasks = vec![
        Task::new("토속촌", Some("서울 종로구 체부동 85-1".to_string())),
        Task::new("체인점", Some("부산 해운대구 우동 1".to_string())),
    ];

    let report = orchestrator(tasks, &sessions, Arc::new(stores.clone())).run().await.unwrap();

    assert_eq!(report.succeeded(), 2);
    let mut clicked = sessions.probe().clicked();
    clicked.sort_unstable();
    assert_eq!(clicked, vec![0, 2]);
}

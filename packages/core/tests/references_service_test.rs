//! Integration tests for ReferencesService
//!
//! Tests cover:
//! - Loading and replacing the current tree
//! - Superseded loads (newest request wins)
//! - Rebuild key and selection reset
//! - Bulk actions: permissions, empty selection, error mapping, refresh
//! - Card titles

use anyhow::Result;
use async_trait::async_trait;
use refgraph_core::{
    BulkAction, BulkActionError, BulkActionReport, BulkActionService, BulkErrorKind, Entity,
    EntityType, PermissionChecker, ReferenceServiceError, ReferenceSource, ReferencesService,
    StaticReferenceSource, TreeConfig,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn link(id: &str) -> Value {
    json!({ "sys": { "type": "Link", "linkType": "Entry", "id": id } })
}

fn entry(id: &str, title: &str, fields: Value) -> Value {
    let mut fields = fields;
    fields["title"] = json!({ "en-US": title });
    json!({ "sys": { "id": id, "type": "Entry", "version": 1 }, "fields": fields })
}

/// root -> [A, B]; A -> [B]
fn diamond_payload() -> Value {
    json!({
        "items": [entry("root", "Root", json!({ "refs": { "en-US": [link("A"), link("B")] } }))],
        "includes": { "Entry": [
            entry("A", "Article A", json!({ "next": { "en-US": link("B") } })),
            entry("B", "Article B", json!({}))
        ] }
    })
}

/// Bulk action service that records calls and answers with a canned report
#[derive(Default)]
struct RecordingBulkService {
    calls: Mutex<Vec<(BulkAction, Vec<String>)>>,
    failing: Vec<String>,
}

impl RecordingBulkService {
    fn failing(ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[async_trait]
impl BulkActionService for RecordingBulkService {
    async fn run(
        &self,
        action: BulkAction,
        entities: &[Arc<Entity>],
    ) -> Result<BulkActionReport, ReferenceServiceError> {
        let ids: Vec<String> = entities.iter().map(|e| e.id().to_string()).collect();
        self.calls.lock().await.push((action, ids.clone()));

        let mut report = BulkActionReport::new(action);
        for id in ids {
            if self.failing.contains(&id) {
                report.errors.push(BulkActionError {
                    entity_id: id,
                    entity_type: EntityType::Entry,
                    kind: BulkErrorKind::Validation {
                        details: vec!["required field missing".to_string()],
                    },
                });
            } else {
                report.succeeded.push(id);
            }
        }
        Ok(report)
    }
}

struct DenyAll;

#[async_trait]
impl PermissionChecker for DenyAll {
    async fn can_perform(&self, _action: BulkAction, _entities: &[Arc<Entity>]) -> bool {
        false
    }
}

/// Source that delays answers per entity id
struct DelayedSource {
    payloads: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
}

#[async_trait]
impl ReferenceSource for DelayedSource {
    async fn fetch_references(&self, entity_id: &str) -> Result<Value, ReferenceServiceError> {
        if let Some(delay) = self.delays.get(entity_id) {
            tokio::time::sleep(*delay).await;
        }
        self.payloads
            .get(entity_id)
            .cloned()
            .ok_or_else(|| ReferenceServiceError::fetch_failed(entity_id.to_string()))
    }
}

/// Source that serves one payload once, then fails every later fetch
struct FailsAfterFirstFetch {
    payload: Value,
    fetches: AtomicUsize,
}

#[async_trait]
impl ReferenceSource for FailsAfterFirstFetch {
    async fn fetch_references(&self, _entity_id: &str) -> Result<Value, ReferenceServiceError> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(self.payload.clone())
        } else {
            Err(ReferenceServiceError::fetch_failed("network down"))
        }
    }
}

/// Bulk action service whose backend is unreachable
struct UnavailableBulkService;

#[async_trait]
impl BulkActionService for UnavailableBulkService {
    async fn run(
        &self,
        _action: BulkAction,
        _entities: &[Arc<Entity>],
    ) -> Result<BulkActionReport, ReferenceServiceError> {
        Err(ReferenceServiceError::bulk_action_failed("service unavailable"))
    }
}

async fn create_service(
    bulk: Arc<RecordingBulkService>,
) -> Result<(ReferencesService, Arc<StaticReferenceSource>)> {
    let source = Arc::new(StaticReferenceSource::new());
    source.insert("root", diamond_payload()).await;
    let service = ReferencesService::new(source.clone(), bulk, TreeConfig::default())?;
    Ok((service, source))
}

// =========================================================================
// Loading Tests
// =========================================================================

#[tokio::test]
async fn test_load_sets_current_tree() -> Result<()> {
    let (service, source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    assert!(service.current().await.is_none());

    let tree = service.load("root").await?;
    assert_eq!(tree.root.id(), "root");
    assert_eq!(tree.stats.total_references, 3);
    assert_eq!(source.fetch_count(), 1);

    let current = service.current().await.expect("tree should be loaded");
    assert_eq!(current.root.children.len(), 2);
    assert_eq!(service.rebuild_key().await, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_load_failure_is_fetch_error() -> Result<()> {
    let (service, _source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    let err = service.load("unknown").await.unwrap_err();
    assert!(err.is_fetch_error());
    assert!(service.current().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let source = Arc::new(StaticReferenceSource::new());
    let config = TreeConfig {
        max_level: 0,
        ..TreeConfig::default()
    };
    let result = ReferencesService::new(source, Arc::new(RecordingBulkService::default()), config);
    assert!(matches!(result, Err(ReferenceServiceError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_newest_load_wins() -> Result<()> {
    let mut payloads = HashMap::new();
    payloads.insert("slow".to_string(), json!({ "items": [entry("slow", "Slow", json!({}))] }));
    payloads.insert("fast".to_string(), json!({ "items": [entry("fast", "Fast", json!({}))] }));
    let mut delays = HashMap::new();
    delays.insert("slow".to_string(), Duration::from_millis(50));

    let service = ReferencesService::new(
        Arc::new(DelayedSource { payloads, delays }),
        Arc::new(RecordingBulkService::default()),
        TreeConfig::default(),
    )?;

    // "slow" is requested first but finishes last
    let (slow, fast) = tokio::join!(service.load("slow"), service.load("fast"));

    assert!(fast.is_ok());
    assert!(matches!(
        slow,
        Err(ReferenceServiceError::Superseded {
            request: 1,
            latest: 2
        })
    ));
    let current = service.current().await.expect("tree should be loaded");
    assert_eq!(current.root.id(), "fast");
    Ok(())
}

#[tokio::test]
async fn test_rebuild_bumps_key_and_resets_selection() -> Result<()> {
    let (service, source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    service.load("root").await?;

    service.select_all(false).await?;
    assert!(service.selected_entities().await?.is_empty());

    let tree = service.rebuild().await?;
    assert_eq!(service.rebuild_key().await, Some(1));
    assert_eq!(tree.selected_entities().len(), 3);
    // rebuilt from the cached payload, not refetched
    assert_eq!(source.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_operations_without_tree() -> Result<()> {
    let (service, _source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    assert!(matches!(service.rebuild().await, Err(ReferenceServiceError::NoTreeLoaded)));
    assert!(matches!(service.toggle("0").await, Err(ReferenceServiceError::NoTreeLoaded)));
    assert!(matches!(
        service.run_bulk_action(BulkAction::Publish).await,
        Err(ReferenceServiceError::NoTreeLoaded)
    ));
    Ok(())
}

// =========================================================================
// Selection Tests
// =========================================================================

#[tokio::test]
async fn test_toggle_is_entity_keyed() -> Result<()> {
    let (service, _source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    service.load("root").await?;
    service.select_all(false).await?;

    // B shown under root (0-0-1) and under A (0-0-0-0-0)
    assert!(service.toggle("0-0-0-0-0").await?);
    let selected = service.selected_entities().await?;
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id(), "B");

    let tree = service.current().await.expect("tree should be loaded");
    let b_under_root = tree.find("0-0-1").expect("node exists");
    assert!(tree.is_selected(b_under_root));

    assert!(matches!(
        service.toggle("9-9-9").await,
        Err(ReferenceServiceError::UnknownNode { .. })
    ));
    Ok(())
}

// =========================================================================
// Bulk Action Tests
// =========================================================================

#[tokio::test]
async fn test_publish_maps_errors_and_refreshes() -> Result<()> {
    let bulk = Arc::new(RecordingBulkService::failing(&["B"]));
    let (service, source) = create_service(bulk.clone()).await?;
    service.load("root").await?;

    let outcome = service.run_bulk_action(BulkAction::Publish).await?;
    assert!(outcome.refreshed);
    assert_eq!(source.fetch_count(), 2);
    assert_eq!(outcome.report.succeeded, vec!["root", "A"]);

    let keys: Vec<&str> = outcome.errors.node_keys().collect();
    assert_eq!(keys, vec!["0-0-0-0-0", "0-0-1"]);

    let calls = bulk.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, BulkAction::Publish);
    assert_eq!(calls[0].1, vec!["root", "A", "B"]);
    Ok(())
}

#[tokio::test]
async fn test_publish_keeps_errors_when_reload_fails() -> Result<()> {
    let source = Arc::new(FailsAfterFirstFetch {
        payload: diamond_payload(),
        fetches: AtomicUsize::new(0),
    });
    let service = ReferencesService::new(
        source.clone(),
        Arc::new(RecordingBulkService::failing(&["B"])),
        TreeConfig::default(),
    )?;
    service.load("root").await?;

    let outcome = service.run_bulk_action(BulkAction::Publish).await?;
    assert!(!outcome.refreshed);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.report.succeeded, vec!["root", "A"]);
    assert_eq!(outcome.report.errors.len(), 1);

    let keys: Vec<&str> = outcome.errors.node_keys().collect();
    assert_eq!(keys, vec!["0-0-0-0-0", "0-0-1"]);

    // the tree from before the publish is still current and flagged
    let cards = service.cards().await?;
    let b_under_root = cards.children()[1].as_card().expect("B is a card");
    assert_eq!(b_under_root.entity_id, "B");
    assert!(b_under_root.has_error);
    Ok(())
}

#[tokio::test]
async fn test_bulk_service_failure_is_returned() -> Result<()> {
    let source = Arc::new(StaticReferenceSource::new());
    source.insert("root", diamond_payload()).await;
    let service = ReferencesService::new(
        source.clone(),
        Arc::new(UnavailableBulkService),
        TreeConfig::default(),
    )?;
    service.load("root").await?;

    let result = service.run_bulk_action(BulkAction::Publish).await;
    assert!(matches!(result, Err(ReferenceServiceError::BulkActionFailed(_))));
    assert_eq!(source.fetch_count(), 1);
    assert!(service.current().await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_validate_does_not_refresh() -> Result<()> {
    let (service, source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    service.load("root").await?;

    let outcome = service.run_bulk_action(BulkAction::Validate).await?;
    assert!(!outcome.refreshed);
    assert!(outcome.errors.is_empty());
    assert_eq!(source.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_bulk_action_requires_selection_and_permission() -> Result<()> {
    let (service, _source) = create_service(Arc::new(RecordingBulkService::default())).await?;
    service.load("root").await?;
    service.select_all(false).await?;
    assert!(matches!(
        service.run_bulk_action(BulkAction::Publish).await,
        Err(ReferenceServiceError::EmptySelection)
    ));

    let source = Arc::new(StaticReferenceSource::new());
    source.insert("root", diamond_payload()).await;
    let denied = ReferencesService::new(
        source,
        Arc::new(RecordingBulkService::default()),
        TreeConfig::default(),
    )?
    .with_permissions(Arc::new(DenyAll));
    denied.load("root").await?;
    assert!(matches!(
        denied.run_bulk_action(BulkAction::Publish).await,
        Err(ReferenceServiceError::PermissionDenied { .. })
    ));
    Ok(())
}

// =========================================================================
// Card Tests
// =========================================================================

#[tokio::test]
async fn test_cards_carry_titles_and_error_flags() -> Result<()> {
    let (service, _source) =
        create_service(Arc::new(RecordingBulkService::failing(&["A"]))).await?;
    service.load("root").await?;
    service.run_bulk_action(BulkAction::Validate).await?;

    let cards = service.cards().await?;
    let root = cards.as_card().expect("root is a card");
    assert_eq!(root.title.as_deref(), Some("Root"));
    assert!(!root.has_error);

    let a = cards.children()[0].as_card().expect("A is a card");
    assert_eq!(a.title.as_deref(), Some("Article A"));
    assert!(a.has_error);
    Ok(())
}

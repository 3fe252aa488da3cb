// End-to-end batch flows through the service surface

use super::test_harness::{harness, harness_with_engine, publish_definition, MarkerEngine};

use sukashi::context::OperationContext;
use sukashi::coordinator::{BatchError, CancelFlag};
use sukashi::media::ImageId;
use sukashi::service::{ApplyAllRequest, ApplySingleRequest, RestoreRequest};
use sukashi::token::Purpose;

fn apply_all_request(hx: &super::test_harness::Harness, ctx: &OperationContext, tags: &[&str]) -> ApplyAllRequest {
    ApplyAllRequest {
        image_ids: tags.iter().map(|t| t.to_string()).collect(),
        token: hx.issuer.issue(ctx, Purpose::ApplyAll).unwrap(),
    }
}

#[tokio::test]
async fn test_apply_then_restore_round_trip() {
    let hx = harness(&["img-1", "img-2", "img-3"]);
    publish_definition(&hx, "Copyright");
    let ctx = OperationContext::new("admin");
    let originals: Vec<_> = ["img-1", "img-2", "img-3"]
        .iter()
        .map(|t| hx.images.bytes_of(t).unwrap())
        .collect();

    let response = hx
        .service
        .apply_all(
            &ctx,
            apply_all_request(&hx, &ctx, &["img-1", "img-2", "img-3"]),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.total, 3);
    assert_eq!(response.processed, 3);
    assert_eq!(response.succeeded, 3);
    assert_eq!(response.failed, 0);
    assert!(response.errors.is_empty());

    for tag in ["img-1", "img-2", "img-3"] {
        assert!(hx.images.bytes_of(tag).unwrap().ends_with(b"+wm"));
        assert!(hx.backups.has_backup(&ImageId::new(tag)).await.unwrap());
    }

    let restore = RestoreRequest {
        image_ids: vec!["img-1".into(), "img-2".into(), "img-3".into()],
        token: hx.issuer.issue(&ctx, Purpose::RestoreBackup).unwrap(),
    };
    let response = hx
        .service
        .restore_backup(&ctx, restore, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(response.succeeded, 3);
    for (tag, original) in ["img-1", "img-2", "img-3"].iter().zip(originals) {
        // Bytes are exactly the pre-apply originals
        assert_eq!(hx.images.bytes_of(tag).unwrap(), original);
        assert!(!hx.backups.has_backup(&ImageId::new(*tag)).await.unwrap());
    }
}

#[tokio::test]
async fn test_partial_failure_reported_per_item() {
    let hx = harness_with_engine(
        &["img-1", "img-2", "img-3", "img-4", "img-5"],
        MarkerEngine::failing_for(&["img-3"]),
    );
    publish_definition(&hx, "Copyright");
    let ctx = OperationContext::new("admin");

    let response = hx
        .service
        .apply_all(
            &ctx,
            apply_all_request(&hx, &ctx, &["img-1", "img-2", "img-3", "img-4", "img-5"]),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.total, 5);
    assert_eq!(response.processed, 5);
    assert_eq!(response.succeeded, 4);
    assert_eq!(response.failed, 1);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].image_id, "img-3");
    assert!(response.errors[0].message.contains("Render failed"));

    // The failed image keeps its current bytes; later images were processed
    assert!(!hx.images.bytes_of("img-3").unwrap().ends_with(b"+wm"));
    assert!(hx.images.bytes_of("img-4").unwrap().ends_with(b"+wm"));
    assert!(hx.images.bytes_of("img-5").unwrap().ends_with(b"+wm"));
}

#[tokio::test]
async fn test_invalid_request_touches_nothing() {
    let hx = harness(&["img-1"]);
    publish_definition(&hx, "Copyright");
    let ctx = OperationContext::new("admin");

    // A garbage token is rejected before processing begins
    let request = ApplyAllRequest {
        image_ids: vec!["img-1".into()],
        token: "garbage".into(),
    };
    let result = hx.service.apply_all(&ctx, request, &CancelFlag::new()).await;

    assert!(matches!(result, Err(BatchError::Auth(_))));
    assert!(!hx.images.bytes_of("img-1").unwrap().ends_with(b"+wm"));
    assert!(!hx.backups.has_backup(&ImageId::new("img-1")).await.unwrap());
}

#[tokio::test]
async fn test_apply_single_unknown_definition_is_pre_batch() {
    let hx = harness(&["img-1"]);
    let ctx = OperationContext::new("admin");
    let missing = sukashi::definition::DefinitionId::new();

    let request = ApplySingleRequest {
        image_ids: vec!["img-1".into()],
        definition_id: missing,
        token: hx
            .issuer
            .issue(&ctx, Purpose::ApplySingle(missing))
            .unwrap(),
    };
    let result = hx
        .service
        .apply_single(&ctx, request, &CancelFlag::new())
        .await;

    assert!(matches!(result, Err(BatchError::DefinitionNotFound(_))));
    assert!(!hx.images.bytes_of("img-1").unwrap().ends_with(b"+wm"));
}

#[tokio::test]
async fn test_apply_single_through_service() {
    let hx = harness(&["img-1", "img-2"]);
    let def = hx
        .definitions
        .create("Forced", super::test_harness::text_params("forced"))
        .unwrap();
    let ctx = OperationContext::new("admin");

    let request = ApplySingleRequest {
        image_ids: vec!["img-1".into(), "img-2".into()],
        definition_id: def.id,
        token: hx.issuer.issue(&ctx, Purpose::ApplySingle(def.id)).unwrap(),
    };
    let response = hx
        .service
        .apply_single(&ctx, request, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(response.succeeded, 2);
    assert_eq!(
        hx.coordinator.applied_definitions(&ImageId::new("img-1")),
        vec![def.id]
    );
}

#[tokio::test]
async fn test_restore_with_nothing_to_restore() {
    let hx = harness(&["img-1", "img-2"]);
    let ctx = OperationContext::new("admin");

    let request = RestoreRequest {
        image_ids: vec!["img-1".into(), "img-2".into()],
        token: hx.issuer.issue(&ctx, Purpose::RestoreBackup).unwrap(),
    };
    let response = hx
        .service
        .restore_backup(&ctx, request, &CancelFlag::new())
        .await
        .unwrap();

    // The batch runs; every item fails individually, nothing aborts
    assert_eq!(response.total, 2);
    assert_eq!(response.processed, 2);
    assert_eq!(response.succeeded, 0);
    assert_eq!(response.failed, 2);
    for error in &response.errors {
        assert!(error.message.contains("No backup"));
    }
}

#[tokio::test]
async fn test_list_definitions_via_service() {
    let hx = harness(&[]);
    let a = publish_definition(&hx, "First");
    hx.definitions
        .create("Second", super::test_harness::text_params("second"))
        .unwrap();

    let all = hx.service.list_definitions(None);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].title, "First");
    assert_eq!(all[1].title, "Second");

    let published = hx
        .service
        .list_definitions(Some(sukashi::definition::DefinitionStatus::Published));
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, a);
}

#[tokio::test]
async fn test_batch_accounting_invariants_hold() {
    let hx = harness_with_engine(
        &["img-1", "img-2", "img-3", "img-4"],
        MarkerEngine::failing_for(&["img-2", "img-4"]),
    );
    publish_definition(&hx, "Copyright");
    let ctx = OperationContext::new("admin");

    let response = hx
        .service
        .apply_all(
            &ctx,
            apply_all_request(&hx, &ctx, &["img-1", "img-2", "img-3", "img-4"]),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.processed, response.total);
    assert_eq!(response.succeeded + response.failed, response.processed);
}

use domains::{ArtifactStore, IngestError, SafetyRating};
use image::ImageFormat;
use integration_tests::{encode, png, swf, Harness};
use services::PostAggregate;

async fn committed(harness: &Harness, file: &str, bytes: &[u8]) -> PostAggregate {
    let upload = harness.upload(file, bytes);
    let mut aggregate = PostAggregate::spawn();
    let staged = harness
        .service
        .ingest_from_path(&mut aggregate, &upload, file)
        .await
        .unwrap();
    aggregate.set_safety(SafetyRating::Safe);
    harness.service.commit(&mut aggregate, staged).await.unwrap();
    aggregate
}

#[tokio::test]
async fn default_thumbnail_is_rendered_lazily() {
    let harness = Harness::new();
    let aggregate = committed(&harness, "wide.png", &png(400, 300)).await;
    let expected = harness
        .artifacts
        .default_thumbnail_path(aggregate.name(), None, None)
        .unwrap();
    assert!(!expected.exists());

    let path = harness
        .service
        .thumbnail_path(aggregate.post(), None, None)
        .await
        .unwrap();
    assert_eq!(path, expected);
    let thumb = image::open(&path).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (150, 150));

    let sized = harness
        .service
        .thumbnail_path(aggregate.post(), Some(300), Some(100))
        .await
        .unwrap();
    assert!(sized.ends_with(format!("thumbnails/300x100/{}", aggregate.name())));
    assert!(!harness.service.has_custom_thumbnail(aggregate.post()).await.unwrap());
}

#[tokio::test]
async fn new_content_clears_the_stale_default_thumbnail() {
    let harness = Harness::new();
    let mut aggregate = committed(&harness, "a.png", &png(200, 200)).await;
    let thumb = harness
        .service
        .thumbnail_path(aggregate.post(), None, None)
        .await
        .unwrap();
    assert!(thumb.exists());

    let replacement = harness.upload("b.png", &png(220, 180));
    let _staged = harness
        .service
        .ingest_from_path(&mut aggregate, &replacement, "b.png")
        .await
        .unwrap();
    assert!(!thumb.exists());
}

#[tokio::test]
async fn custom_thumbnail_must_match_format_and_size() {
    let harness = Harness::new();
    let aggregate = committed(&harness, "a.png", &png(500, 500)).await;

    let wrong_size = harness.upload("thumb-small.png", &png(100, 100));
    let err = harness
        .service
        .set_custom_thumbnail(aggregate.post(), &wrong_size)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidThumbnail(_)));

    let bitmap = harness.upload("thumb.bmp", &encode(150, 150, ImageFormat::Bmp));
    let err = harness
        .service
        .set_custom_thumbnail(aggregate.post(), &bitmap)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidThumbnail(_)));
    assert!(!harness.service.has_custom_thumbnail(aggregate.post()).await.unwrap());

    let good = harness.upload("thumb.jpg", &encode(150, 150, ImageFormat::Jpeg));
    let stored = harness
        .service
        .set_custom_thumbnail(aggregate.post(), &good)
        .await
        .unwrap();
    assert!(harness.service.has_custom_thumbnail(aggregate.post()).await.unwrap());

    // custom wins whatever size is asked for
    let resolved = harness
        .service
        .thumbnail_path(aggregate.post(), Some(400), Some(400))
        .await
        .unwrap();
    assert_eq!(resolved, stored);
}

#[tokio::test]
async fn out_of_bounds_sizes_are_rejected() {
    let harness = Harness::new();
    let aggregate = committed(&harness, "a.png", &png(64, 64)).await;

    for (width, height) in [(Some(10), None), (None, Some(5000)), (Some(1001), Some(150))] {
        let err = harness
            .service
            .generate_thumbnail(aggregate.post(), width, height)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidThumbnailSize { .. }));
    }
}

#[tokio::test]
async fn thumbnail_failure_does_not_affect_the_post() {
    let harness = Harness::new();
    let aggregate = committed(&harness, "game.swf", &swf()).await;

    let err = harness
        .service
        .thumbnail_path(aggregate.post(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ThumbnailUnavailable(_)));

    let id = aggregate.id().unwrap();
    let loaded = harness.service.load(id).await.unwrap().unwrap();
    assert_eq!(loaded.post().name, aggregate.name());
}

use cgmath::{Deg, Point3, Rad};
use futures::{join, pin_mut, poll};
use step_ngin::{
    LoadError, SourceReference, StepViewer, ViewerConfig, WindowEvent,
    cancel::CancelToken,
    data_structures::scene_graph::SceneNode,
    load::{LoadOutcome, LoadState},
};
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceId, ElementState, MouseButton},
};

use crate::common::test_utils::{Harness, step_bytes};

mod common;

const BRACKET: &str = "https://cdn.test/parts/bracket.step";
const HOUSING: &str = "https://cdn.test/parts/housing.step";

fn url(url: &str) -> SourceReference {
    SourceReference::url(url).unwrap()
}

fn viewer(harness: &Harness) -> StepViewer {
    StepViewer::new(harness.loader.clone(), ViewerConfig::default())
}

#[tokio::test]
async fn should_fetch_and_convert_a_url_once() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve(BRACKET, step_bytes(&[([0.0; 3], 2.0), ([3.0, 0.0, 0.0], 1.0)]));
    let token = CancelToken::new();

    let mut first = harness.loader.load_step(&url(BRACKET), &token).await.unwrap();
    let second = harness.loader.load_step(&url(BRACKET), &token).await.unwrap();

    assert_eq!(harness.fetcher.calls(), 1);
    assert_eq!(harness.engine.conversions.get(), 1);
    assert_eq!(first.mesh_count(), 2);
    assert_eq!(second.mesh_count(), 2);
    assert_eq!(first.bounding_box(), second.bounding_box());

    let mut moved = *first.get_local_transform();
    moved.position.x += 100.0;
    first.set_local_transform(moved);
    assert_ne!(first.bounding_box(), second.bounding_box());

    let third = harness.loader.load_step(&url(BRACKET), &token).await.unwrap();
    assert_eq!(third.bounding_box(), second.bounding_box());
}

#[tokio::test]
async fn should_hand_out_independent_copies_from_the_cache() {
    let harness = Harness::new();
    harness.fetcher.serve(
        BRACKET,
        step_bytes(&[([0.0; 3], 2.0), ([3.0, 0.0, 0.0], 1.0), ([0.0, 4.0, 0.0], 1.0)]),
    );
    let token = CancelToken::new();

    let mut first = harness.loader.load_step(&url(BRACKET), &token).await.unwrap();
    let second = harness.loader.load_step(&url(BRACKET), &token).await.unwrap();

    assert_eq!(first.get_children().len(), second.get_children().len());
    for (a, b) in first.get_children().iter().zip(second.get_children()) {
        let (a, b) = (a.get_mesh().unwrap(), b.get_mesh().unwrap());
        assert_eq!(a.name, b.name);
        assert_eq!(a.vertex_count(), b.vertex_count());
        assert_eq!(a.indices.len(), b.indices.len());
        assert_eq!(a.material, b.material);
    }

    first.get_children_mut().pop();
    assert_eq!(first.mesh_count(), 2);
    assert_eq!(second.mesh_count(), 3);
    let third = harness.loader.load_step(&url(BRACKET), &token).await.unwrap();
    assert_eq!(third.mesh_count(), 3);
    assert_eq!(harness.engine.conversions.get(), 1);
}

#[tokio::test]
async fn should_never_cache_binary_sources() {
    let harness = Harness::new();
    let bytes = SourceReference::from(step_bytes(&[([1.0; 3], 1.0)]));
    let token = CancelToken::new();

    harness.loader.load_step(&bytes, &token).await.unwrap();
    harness.loader.load_step(&bytes, &token).await.unwrap();

    assert_eq!(harness.engine.conversions.get(), 2);
    assert_eq!(harness.fetcher.calls(), 0);
    assert!(harness.loader.cache().is_empty());
}

#[tokio::test]
async fn should_center_and_frame_the_loaded_model() {
    let harness = Harness::new();
    harness
        .fetcher
        .serve(BRACKET, step_bytes(&[([10.0, 20.0, 30.0], 2.0)]));
    let viewer = viewer(&harness);

    let load = viewer.set_source(url(BRACKET));
    assert!(viewer.is_loading());
    assert_eq!(viewer.state(), LoadState::Loading);
    assert_eq!(load.await, LoadOutcome::Ready);

    assert!(!viewer.is_loading());
    assert_eq!(viewer.state(), LoadState::Ready);
    let model = viewer.model();
    let bbox = model.as_ref().unwrap().bounding_box();
    assert!((bbox.center() - Point3::new(0.0, 0.0, 0.0)).x.abs() < 1e-5);
    assert!((bbox.center() - Point3::new(0.0, 0.0, 0.0)).y.abs() < 1e-5);
    assert!((bbox.center() - Point3::new(0.0, 0.0, 0.0)).z.abs() < 1e-5);

    let expected = 2.0 / (Rad::from(Deg(75.0_f32)).0 / 2.0).tan() * 1.5;
    let camera = viewer.camera();
    assert!((camera.position.z - expected).abs() < 1e-4);
    assert!((camera.zfar - expected * 10.0).abs() < 1e-3);
    assert_eq!(viewer.controls().target, camera.target);
}

#[tokio::test]
async fn should_only_display_the_newest_source() {
    let harness = Harness::new();
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    harness
        .fetcher
        .serve(HOUSING, step_bytes(&[([0.0; 3], 4.0), ([5.0; 3], 4.0)]));
    let release_bracket = harness.fetcher.hold(BRACKET);
    let release_housing = harness.fetcher.hold(HOUSING);
    let viewer = viewer(&harness);

    let bracket = viewer.set_source(url(BRACKET));
    pin_mut!(bracket);
    assert!(poll!(&mut bracket).is_pending());

    let housing = viewer.set_source(url(HOUSING));
    release_housing.send(()).unwrap();
    assert_eq!(housing.await, LoadOutcome::Ready);

    let _ = release_bracket.send(());
    assert_eq!(bracket.await, LoadOutcome::Cancelled);

    assert_eq!(viewer.state(), LoadState::Ready);
    assert_eq!(viewer.model().as_ref().unwrap().mesh_count(), 2);
    assert_eq!(viewer.model_version(), 1);
    // The superseded request was dropped before its bytes arrived.
    assert_eq!(harness.fetcher.completed(), 1);
    assert!(!harness.loader.cache().contains(BRACKET));
}

#[tokio::test]
async fn should_ignore_an_older_source_that_finishes_first() {
    let harness = Harness::new();
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    harness
        .fetcher
        .serve(HOUSING, step_bytes(&[([0.0; 3], 4.0), ([5.0; 3], 4.0)]));
    let release_bracket = harness.fetcher.hold(BRACKET);
    let release_housing = harness.fetcher.hold(HOUSING);
    let viewer = viewer(&harness);

    let bracket = viewer.set_source(url(BRACKET));
    pin_mut!(bracket);
    assert!(poll!(&mut bracket).is_pending());
    let housing = viewer.set_source(url(HOUSING));

    let _ = release_bracket.send(());
    assert_eq!(bracket.await, LoadOutcome::Cancelled);
    assert_eq!(viewer.state(), LoadState::Loading);
    assert!(viewer.is_loading());
    assert!(viewer.model().is_none());
    assert_eq!(viewer.model_version(), 0);

    release_housing.send(()).unwrap();
    assert_eq!(housing.await, LoadOutcome::Ready);
    assert_eq!(viewer.state(), LoadState::Ready);
    assert!(!viewer.is_loading());
    assert_eq!(viewer.model().as_ref().unwrap().mesh_count(), 2);
    assert!(!harness.loader.cache().contains(BRACKET));
}

#[tokio::test]
async fn should_build_twice_on_a_concurrent_miss() {
    let harness = Harness::new();
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    let first = harness.fetcher.hold(BRACKET);
    let second = harness.fetcher.hold(BRACKET);
    let left = viewer(&harness);
    let right = viewer(&harness);
    let release = async move {
        first.send(()).unwrap();
        second.send(()).unwrap();
    };

    let (a, b, ()) = join!(
        left.set_source(url(BRACKET)),
        right.set_source(url(BRACKET)),
        release
    );

    assert_eq!((a, b), (LoadOutcome::Ready, LoadOutcome::Ready));
    assert_eq!(harness.fetcher.calls_for(BRACKET), 2);
    assert_eq!(harness.engine.conversions.get(), 2);
    assert_eq!(harness.loader.cache().len(), 1);

    assert_eq!(right.set_source(url(BRACKET)).await, LoadOutcome::Ready);
    assert_eq!(harness.fetcher.calls_for(BRACKET), 2);
}

#[tokio::test]
async fn should_reject_values_that_are_no_source() {
    let harness = Harness::new();
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    let viewer = viewer(&harness);
    assert_eq!(viewer.set_source(url(BRACKET)).await, LoadOutcome::Ready);

    let outcome = viewer.set_source_any(Box::new(42_i32)).await;

    assert!(matches!(outcome, LoadOutcome::Rejected(LoadError::InvalidInput(_))));
    assert_eq!(viewer.state(), LoadState::Idle);
    assert!(viewer.model().is_none());
    assert!(!viewer.is_loading());
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn should_keep_the_previous_model_when_a_load_fails() {
    let harness = Harness::new();
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    harness
        .fetcher
        .serve(HOUSING, b"<html>not a step file</html>".to_vec());
    let viewer = viewer(&harness);
    assert_eq!(viewer.set_source(url(BRACKET)).await, LoadOutcome::Ready);

    let missing = viewer
        .set_source(url("https://cdn.test/parts/missing.step"))
        .await;
    assert_eq!(
        missing,
        LoadOutcome::Failed(LoadError::Fetch {
            status: 404,
            status_text: "Not Found".into()
        })
    );
    assert_eq!(viewer.state(), LoadState::Failed);
    assert!(!viewer.is_loading());
    assert!(viewer.model().is_some());

    let malformed = viewer.set_source(url(HOUSING)).await;
    assert!(matches!(malformed, LoadOutcome::Failed(LoadError::Conversion(_))));
    assert!(viewer.model().is_some());
    assert!(!harness.loader.cache().contains(HOUSING));
}

#[test]
fn should_start_the_engine_when_created() {
    let harness = Harness::new();
    assert!(!harness.binding.is_started());

    let first = viewer(&harness);
    assert!(harness.binding.is_started());
    assert!(first.loader().engine().is_started());
    assert_eq!(harness.engine.inits.get(), 1);

    let _second = viewer(&harness);
    assert_eq!(harness.engine.inits.get(), 1);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn should_remember_a_failed_engine_start() {
    let harness = Harness::with_engine(true);
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    let viewer = viewer(&harness);

    viewer.preload().await;
    let first = viewer.set_source(url(BRACKET)).await;
    let second = viewer.set_source(url(BRACKET)).await;

    assert!(matches!(first, LoadOutcome::Failed(LoadError::EngineInit(_))));
    assert_eq!(first, second);
    assert_eq!(harness.engine.inits.get(), 1);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn should_apply_nothing_after_dispose() {
    let harness = Harness::new();
    harness.fetcher.serve(BRACKET, step_bytes(&[([0.0; 3], 1.0)]));
    let release = harness.fetcher.hold(BRACKET);
    let viewer = viewer(&harness);

    let load = viewer.set_source(url(BRACKET));
    pin_mut!(load);
    assert!(poll!(&mut load).is_pending());

    viewer.dispose();
    let _ = release.send(());

    assert_eq!(load.await, LoadOutcome::Cancelled);
    assert!(viewer.model().is_none());
    assert!(!viewer.is_loading());
    assert_eq!(viewer.state(), LoadState::Cancelled);
    assert_eq!(
        viewer.set_source(url(BRACKET)).await,
        LoadOutcome::Cancelled
    );
}

#[tokio::test]
async fn should_load_typed_binary_views() {
    let harness = Harness::new();
    let viewer = viewer(&harness);
    let bytes = step_bytes(&[([0.0; 3], 3.0)]);

    assert_eq!(viewer.set_source_any(Box::new(bytes)).await, LoadOutcome::Ready);
    assert_eq!(viewer.model().as_ref().unwrap().mesh_count(), 1);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[test]
fn should_ignore_drags_until_the_surface_size_is_known() {
    let harness = Harness::new();
    let viewer = viewer(&harness);
    let drag = |viewer: &StepViewer, from: f64| {
        viewer.handle_window_event(&WindowEvent::MouseInput {
            device_id: DeviceId::dummy(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        for x in [from, from + 200.0] {
            viewer.handle_window_event(&WindowEvent::CursorMoved {
                device_id: DeviceId::dummy(),
                position: PhysicalPosition::new(x, 50.0),
            });
        }
    };

    drag(&viewer, 100.0);
    assert!(!viewer.controls().is_moving());

    viewer.resize(800, 600);
    assert_eq!(viewer.controls().viewport_height(), Some(600.0));
    assert!((viewer.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
    drag(&viewer, 400.0);
    assert!(viewer.controls().is_moving());
}

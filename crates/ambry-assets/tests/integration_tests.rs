//! Integration tests for the asset pipeline.
//!
//! These drive a real manager (loader thread included) against in-memory and
//! tempfile-backed asset stores.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use ambry_assets::prelude::*;
use ambry_test_utils::*;
use futures_lite::future::block_on;

// ============================================================================
// Helper Functions
// ============================================================================

struct Harness {
    fs: MemoryAssetFs,
    content: Arc<MockContentManager>,
    manager: AssetManager,
    scheduler: Scheduler,
    events: Vec<AssetEvent>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(AssetManagerConfig::new())
    }

    fn with_config(config: AssetManagerConfig) -> Self {
        init_logging();
        let fs = MemoryAssetFs::new();
        let content = Arc::new(MockContentManager::new());
        let config = config.with_content_manager(content.clone());
        let manager = AssetManager::with_config(fs.clone(), loaders(), config);
        let scheduler = Scheduler::new();
        scheduler.spawn(manager.run_finalizer()).detach();
        Self {
            fs,
            content,
            manager,
            scheduler,
            events: Vec::new(),
        }
    }

    fn insert(&self, name: &str, container: &WritableContainer) {
        self.fs.insert_container(name, container).unwrap();
    }

    fn settle<T: Asset>(&self, reference: &impl AssetRef<T>) -> AssetState {
        pump_until_settled(&self.scheduler, reference)
    }

    /// Pump until an event matching `predicate` arrives, keeping everything drained.
    fn pump_until_event(&mut self, predicate: impl Fn(&AssetEvent) -> bool) -> bool {
        let Self {
            manager,
            scheduler,
            events,
            ..
        } = self;
        pump_until(scheduler, || {
            events.extend(manager.drain_events());
            events.iter().any(&predicate)
        })
    }
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_text_asset() {
    let h = Harness::new();
    h.insert("text.Greeting", &text_container("Hello, world"));

    let greeting = h.manager.get::<String>("text.Greeting").unwrap();
    assert_eq!(h.settle(&greeting), AssetState::Ready);
    assert_eq!(greeting.asset().unwrap().unwrap().as_str(), "Hello, world");
}

#[test]
fn test_load_from_forward_only_store() {
    let h = Harness::new();
    h.fs.set_forward_only(true);

    let mut container = texture_container(&[9; 64]);
    container.add_dependency("texture.Palette");
    container.set_string("Comment", "forward streams read the index first");
    h.insert("texture.Stream", &container);

    let texture = h.manager.get::<Texture>("texture.Stream").unwrap();
    assert_eq!(h.settle(&texture), AssetState::Ready);

    let texture = texture.asset().unwrap().unwrap();
    assert_eq!(texture.pixels, vec![9; 64]);
    assert_eq!(texture.dependencies, vec!["texture.Palette".to_string()]);
}

#[test]
fn test_forward_only_reader_random_access() {
    let mut container = WritableContainer::new();
    container.set_byte_array("First", vec![1, 2, 3]);
    container.set_byte_array("Second", vec![4, 5]);
    let bytes = container.to_bytes().unwrap();

    let reader = ReadableContainer::from_stream(
        AssetStream::forward(ForwardOnly::from_bytes(bytes)),
        false,
    )
    .unwrap();

    assert_eq!(reader.get_byte_array("Second").unwrap(), vec![4, 5]);
    assert_eq!(reader.get_byte_array("First").unwrap(), vec![1, 2, 3]);
    assert_eq!(reader.get_byte_array("Second").unwrap(), vec![4, 5]);
}

#[test]
fn test_state_machine_progression() {
    let h = Harness::new();
    h.insert("texture.Grass", &texture_container(&[1, 2, 3, 4]));

    let grass = h.manager.get::<Texture>("texture.Grass").unwrap();
    assert!(matches!(
        grass.state(),
        AssetState::NotReady | AssetState::PartiallyReady
    ));

    // Loaded but not finalized until the scheduler ticks.
    assert!(wait_until(|| grass.state() == AssetState::PartiallyReady));
    let partial = grass.asset().unwrap().unwrap();
    assert!(!partial.is_uploaded());
    assert_eq!(h.content.count_uploads(), 0);

    assert_eq!(h.settle(&grass), AssetState::Ready);
    let ready = grass.asset().unwrap().unwrap();
    assert!(Arc::ptr_eq(&partial, &ready));
    assert!(ready.is_uploaded());
    assert_eq!(h.content.uploads_of("texture.Grass"), 1);
    assert_eq!(grass.version(), 1);
}

#[test]
fn test_missing_asset_is_unavailable() {
    let mut h = Harness::new();
    let missing = h.manager.get::<Texture>("texture.Missing").unwrap();

    assert_eq!(h.settle(&missing), AssetState::Unavailable);
    assert!(matches!(
        missing.asset(),
        Err(AssetError::Unavailable { ref name, .. }) if name == "texture.Missing"
    ));
    assert!(matches!(
        missing.loading_error().as_deref(),
        Some(AssetError::NotFound { .. })
    ));
    assert!(h.pump_until_event(|e| e.is_failure() && e.name() == "texture.Missing"));
}

#[test]
fn test_unknown_loader_tag() {
    let h = Harness::new();
    let mut container = WritableContainer::new();
    container.set_loader("mesh");
    container.set_data(vec![0; 8]);
    h.insert("mesh.Ship", &container);

    let ship = h.manager.get::<Vec<u8>>("mesh.Ship").unwrap();
    assert_eq!(h.settle(&ship), AssetState::Unavailable);
    assert!(matches!(
        ship.loading_error().as_deref(),
        Some(AssetError::NoLoader { tag }) if tag == "mesh"
    ));
}

#[test]
fn test_loader_failure_message() {
    let h = Harness::new();
    h.insert("texture.Broken", &failing_texture_container("bad header"));

    let broken = h.manager.get::<Texture>("texture.Broken").unwrap();
    assert_eq!(h.settle(&broken), AssetState::Unavailable);
    match broken.loading_error().as_deref() {
        Some(AssetError::LoaderFailed { name, message }) => {
            assert_eq!(name, "texture.Broken");
            assert_eq!(message, "bad header");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_requested_type_must_match_loader() {
    let h = Harness::new();
    h.insert("text.Notes", &text_container("not pixels"));

    let notes = h.manager.get::<Texture>("text.Notes").unwrap();
    assert_eq!(h.settle(&notes), AssetState::Unavailable);
    assert!(matches!(
        notes.loading_error().as_deref(),
        Some(AssetError::TypeMismatch {
            expected: "Texture",
            actual: "String",
            ..
        })
    ));

    // The name stays tracked as a texture.
    assert!(matches!(
        h.manager.get::<String>("text.Notes"),
        Err(AssetError::TypeMismatch { .. })
    ));
}

#[test]
fn test_dependencies_without_loading() {
    let h = Harness::new();
    let mut container = texture_container(&[0; 16]);
    container.add_dependency("texture.Base");
    container.add_dependency("shader.Lit");
    h.insert("material.Hull", &container);

    assert_eq!(
        h.manager.dependencies("material.Hull").unwrap(),
        vec!["texture.Base".to_string(), "shader.Lit".to_string()]
    );
    assert!(!h.manager.is_tracked("material.Hull"));
    assert_eq!(h.manager.load_requests(), 0);

    assert!(matches!(
        h.manager.dependencies("material.Missing"),
        Err(AssetError::NotFound { .. })
    ));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_concurrent_get_loads_once() {
    init_logging();
    let fs = MemoryAssetFs::new();
    fs.insert_container("text.Shared", &text_container("shared"))
        .unwrap();
    let (counting, loads) = CountingLoader::new(TextLoader);
    let manager = AssetManager::new(fs, LoaderRegistry::new().with(counting));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || manager.get::<String>("text.Shared").unwrap())
        })
        .collect();
    let references: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    for reference in &references[1..] {
        assert!(reference.ptr_eq(&references[0]));
    }
    assert_eq!(manager.load_requests(), 1);
    assert_eq!(manager.tracked_count(), 1);

    let scheduler = Scheduler::new();
    scheduler.spawn(manager.run_finalizer()).detach();
    assert_eq!(
        pump_until_settled(&scheduler, &references[0]),
        AssetState::Ready
    );
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wait_futures_on_scheduler() {
    let h = Harness::new();
    h.insert("text.Later", &text_container("later"));

    let later = h.manager.get::<String>("text.Later").unwrap();
    let missing = h.manager.get::<String>("text.Nowhere").unwrap();

    let required = h.scheduler.spawn({
        let later = later.clone();
        async move { later.wait_until_ready().await }
    });
    let optional = h
        .scheduler
        .spawn(async move { missing.wait_until_ready_optional().await });

    assert!(pump_until(&h.scheduler, || {
        required.is_finished() && optional.is_finished()
    }));
    assert!(block_on(required).is_ok());
    assert!(!block_on(optional));
    assert!(later.is_ready());
}

#[test]
fn test_required_wait_fails_when_unavailable() {
    let h = Harness::new();
    let missing = h.manager.get::<String>("text.Nowhere").unwrap();
    let waiting = h
        .scheduler
        .spawn(async move { missing.wait(WaitPolicy::Required).await });

    assert!(pump_until(&h.scheduler, || waiting.is_finished()));
    assert!(matches!(
        block_on(waiting),
        Err(AssetError::Unavailable { .. })
    ));
}

// ============================================================================
// Finalization Tests
// ============================================================================

#[test]
fn test_finalize_without_content_manager() {
    init_logging();
    let fs = MemoryAssetFs::new();
    fs.insert_container("texture.Plain", &texture_container(&[7; 4]))
        .unwrap();
    let manager = AssetManager::new(fs, loaders());
    let scheduler = Scheduler::new();
    scheduler.spawn(manager.run_finalizer()).detach();

    let plain = manager.get::<Texture>("texture.Plain").unwrap();
    assert_eq!(pump_until_settled(&scheduler, &plain), AssetState::Ready);
    assert!(!plain.asset().unwrap().unwrap().is_uploaded());
}

#[test]
fn test_finalize_failure_is_unavailable() {
    let mut h = Harness::new();
    h.content.reject("texture.Rejected");
    h.insert("texture.Rejected", &texture_container(&[1]));

    let rejected = h.manager.get::<Texture>("texture.Rejected").unwrap();
    assert_eq!(h.settle(&rejected), AssetState::Unavailable);
    assert!(matches!(
        rejected.loading_error().as_deref(),
        Some(AssetError::FinalizeFailed { .. })
    ));
    assert!(h.pump_until_event(|e| e.is_failure()));
    assert_eq!(
        h.content.calls(),
        vec![ContentCall::Rejected {
            name: "texture.Rejected".to_string()
        }]
    );
}

#[test]
fn test_finalize_budget_per_tick() {
    init_logging();
    let fs = MemoryAssetFs::new();
    for name in ["texture.A", "texture.B", "texture.C"] {
        fs.insert_container(name, &texture_container(&[1, 2]))
            .unwrap();
    }
    let content = Arc::new(MockContentManager::new());
    let config = AssetManagerConfig::new()
        .with_finalize_budget(2)
        .with_content_manager(content.clone());
    let manager = AssetManager::with_config(fs, loaders(), config);

    let refs: Vec<_> = ["texture.A", "texture.B", "texture.C"]
        .into_iter()
        .map(|name| manager.get::<Texture>(name).unwrap())
        .collect();
    assert!(wait_until(|| manager.pending_finalizations() == 3));

    assert_eq!(manager.finalize_pending(), 2);
    assert_eq!(manager.pending_finalizations(), 1);
    assert_eq!(content.count_uploads(), 2);

    assert_eq!(manager.finalize_pending(), 1);
    assert_eq!(manager.finalize_pending(), 0);
    assert!(refs.iter().all(|r| r.is_ready()));
}

#[test]
fn test_stale_finalization_does_not_revive_removed_asset() {
    let h = Harness::new();
    h.insert("texture.Old", &texture_container(&[7; 2]));
    let old = h.manager.get::<Texture>("texture.Old").unwrap();
    assert!(wait_until(|| old.state() == AssetState::PartiallyReady));

    // The reload triggered by the removal fails before the first value finalizes.
    assert!(h.fs.remove("texture.Old"));
    assert!(wait_until(|| old.state() == AssetState::Unavailable));
    assert!(pump_until(&h.scheduler, || h.manager.pending_finalizations() == 0));

    assert_eq!(old.state(), AssetState::Unavailable);
    assert!(matches!(
        old.loading_error().as_deref(),
        Some(AssetError::NotFound { .. })
    ));
    assert_eq!(h.content.count_uploads(), 0);
    assert!(matches!(
        h.manager.drain_events().as_slice(),
        [AssetEvent::Failed { .. }]
    ));
}

// ============================================================================
// Hot Reload Tests
// ============================================================================

#[test]
fn test_reload_swaps_ready_value() {
    let mut h = Harness::new();
    h.insert("texture.Sky", &texture_container(&[1; 4]));
    let sky = h.manager.get::<Texture>("texture.Sky").unwrap();
    assert_eq!(h.settle(&sky), AssetState::Ready);
    let original = sky.asset().unwrap().unwrap();
    let version = sky.version();
    h.events.extend(h.manager.drain_events());

    // Replacing the bytes notifies the manager, which reloads in the background.
    h.insert("texture.Sky", &texture_container(&[2; 8]));

    let observer = sky.clone();
    let Harness {
        manager,
        scheduler,
        events,
        ..
    } = &mut h;
    assert!(pump_until(scheduler, || {
        // Readers never see the asset disappear during the swap.
        assert_eq!(observer.state(), AssetState::Ready);
        assert!(observer.asset().unwrap().is_some());
        events.extend(manager.drain_events());
        events.iter().any(AssetEvent::is_reloaded)
    }));

    let current = sky.asset().unwrap().unwrap();
    assert_eq!(current.pixels, vec![2; 8]);
    assert!(current.is_uploaded());
    assert!(original.is_released());
    assert!(sky.version() > version);
    assert_eq!(h.content.uploads_of("texture.Sky"), 2);
}

#[test]
fn test_failed_reload_keeps_ready_value() {
    let mut h = Harness::new();
    h.insert("texture.Logo", &texture_container(&[5; 4]));
    let logo = h.manager.get::<Texture>("texture.Logo").unwrap();
    assert_eq!(h.settle(&logo), AssetState::Ready);
    let version = logo.version();

    h.insert("texture.Logo", &failing_texture_container("truncated"));
    assert!(h.pump_until_event(|e| matches!(e, AssetEvent::ReloadDiscarded { .. })));

    assert_eq!(logo.state(), AssetState::Ready);
    let kept = logo.asset().unwrap().unwrap();
    assert_eq!(kept.pixels, vec![5; 4]);
    assert!(!kept.is_released());
    assert_eq!(logo.version(), version);
    assert!(logo.loading_error().is_none());
}

#[test]
fn test_rejected_reload_upload_keeps_ready_value() {
    let mut h = Harness::new();
    h.insert("texture.Banner", &texture_container(&[3; 4]));
    let banner = h.manager.get::<Texture>("texture.Banner").unwrap();
    assert_eq!(h.settle(&banner), AssetState::Ready);
    let version = banner.version();
    let original = banner.asset().unwrap().unwrap();

    // The new bytes load fine but the upload is refused at finalize time.
    h.content.reject("texture.Banner");
    h.insert("texture.Banner", &texture_container(&[4; 4]));
    assert!(h.pump_until_event(|e| matches!(e, AssetEvent::ReloadDiscarded { .. })));

    assert_eq!(banner.state(), AssetState::Ready);
    let kept = banner.asset().unwrap().unwrap();
    assert!(Arc::ptr_eq(&kept, &original));
    assert_eq!(kept.pixels, vec![3; 4]);
    assert!(!kept.is_released());
    assert_eq!(banner.version(), version);
    assert_eq!(h.content.uploads_of("texture.Banner"), 1);
    assert!(h.content.calls().contains(&ContentCall::Rejected {
        name: "texture.Banner".to_string()
    }));
}

#[test]
fn test_reload_recovers_unavailable_asset() {
    let h = Harness::new();
    let late = h.manager.get::<String>("text.Late").unwrap();
    assert_eq!(h.settle(&late), AssetState::Unavailable);

    h.insert("text.Late", &text_container("arrived"));
    assert!(pump_until(&h.scheduler, || late.is_ready()));
    assert_eq!(late.asset().unwrap().unwrap().as_str(), "arrived");
    assert!(late.loading_error().is_none());
}

// ============================================================================
// Preference List Tests
// ============================================================================

#[test]
fn test_preference_list_selects_first_available() {
    let h = Harness::new();
    h.insert("texture.Medium", &texture_container(&[2; 2]));
    h.insert("texture.Low", &texture_container(&[1]));

    // Finish the fallback first so it is Ready before the list exists.
    let low = h.manager.get::<Texture>("texture.Low").unwrap();
    assert_eq!(h.settle(&low), AssetState::Ready);

    let list = h
        .manager
        .get_preferred::<Texture>(["texture.High", "texture.Medium", "texture.Low"])
        .unwrap();
    assert_eq!(list.entries().len(), 3);
    assert!(list.entries()[2].ptr_eq(&low));

    // Without ticking, the missing entry fails and the medium one stalls at
    // PartiallyReady.
    assert!(wait_until(|| {
        list.entries()[0].state() == AssetState::Unavailable
            && list.entries()[1].state() == AssetState::PartiallyReady
    }));
    assert_eq!(list.state(), AssetState::NotReady);
    assert_eq!(list.selected().unwrap().name(), "texture.Medium");

    assert_eq!(h.settle(&list), AssetState::Ready);
    assert_eq!(list.asset().unwrap().unwrap().pixels, vec![2; 2]);
}

#[test]
fn test_preference_list_all_unavailable() {
    let h = Harness::new();
    let list = h
        .manager
        .get_preferred::<String>(["text.First", "text.Second"])
        .unwrap();

    assert_eq!(h.settle(&list), AssetState::Unavailable);
    assert!(list.selected().is_none());
    match list.asset() {
        Err(AssetError::AllUnavailable { errors }) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// Local Store Tests
// ============================================================================

#[test]
fn test_local_store_round_trip() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let fs = LocalAssetFs::new(dir.path());
    fs.write_container("text.ui.Title", &text_container("Ambry"))
        .unwrap();
    assert!(dir.path().join("text/ui/Title.bin").exists());

    let manager = AssetManager::new(fs.clone(), loaders());
    let scheduler = Scheduler::new();
    scheduler.spawn(manager.run_finalizer()).detach();

    let title = manager.get::<String>("text.ui.Title").unwrap();
    assert_eq!(pump_until_settled(&scheduler, &title), AssetState::Ready);
    assert_eq!(title.asset().unwrap().unwrap().as_str(), "Ambry");

    fs.write_container("text.ui.Title", &text_container("Ambry 2"))
        .unwrap();
    fs.notify_changed("text.ui.Title");
    assert!(pump_until(&scheduler, || title.version() == 2));
    assert_eq!(title.asset().unwrap().unwrap().as_str(), "Ambry 2");
}

#[cfg(feature = "hot-reload")]
#[test]
fn test_watcher_triggers_reload() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let fs = LocalAssetFs::new(dir.path());
    fs.write_container("Banner", &text_container("v1")).unwrap();

    let manager = AssetManager::new(fs.clone(), loaders());
    let scheduler = Scheduler::new();
    scheduler.spawn(manager.run_finalizer()).detach();
    let _watcher = fs.watch().unwrap();

    let banner = manager.get::<String>("Banner").unwrap();
    assert_eq!(pump_until_settled(&scheduler, &banner), AssetState::Ready);

    fs.write_container("Banner", &text_container("v2")).unwrap();
    assert!(pump_until(&scheduler, || {
        banner
            .asset()
            .ok()
            .flatten()
            .is_some_and(|text| text.as_str() == "v2")
    }));
}

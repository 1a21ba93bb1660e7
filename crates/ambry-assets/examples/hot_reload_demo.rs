//! Asset hot-reloading demo.
//!
//! Compiles a text asset into a temporary directory, watches it, and rewrites it a
//! few times. Each rewrite swaps the value in place; the last one is broken and is
//! discarded while the previous value stays ready.
//!
//! Run with `cargo run --example hot_reload_demo --features hot-reload`.

use std::thread;
use std::time::{Duration, Instant};

use ambry_assets::prelude::*;
use ambry_core::profiling::{ProfilingBackend, init_profiling, new_frame};

fn text(body: &str) -> WritableContainer {
    let mut container = WritableContainer::new();
    container.set_loader(TextLoader::TAG);
    container.set_data(body.as_bytes().to_vec());
    container
}

/// Tick until some event arrives or two seconds pass.
fn pump(manager: &AssetManager, scheduler: &Scheduler) -> Vec<AssetEvent> {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        new_frame();
        scheduler.tick();
        let events = manager.drain_events();
        if !events.is_empty() {
            return events;
        }
        thread::sleep(Duration::from_millis(10));
    }
    Vec::new()
}

fn main() -> AssetResult<()> {
    ambry_core::logging::init();
    init_profiling(ProfilingBackend::InProcess);

    let dir = tempfile::tempdir()?;
    let fs = LocalAssetFs::new(dir.path());
    fs.write_container("Banner", &text("first draft"))?;

    let manager = AssetManager::new(fs.clone(), LoaderRegistry::with_builtin());
    let scheduler = Scheduler::new();
    scheduler.spawn(manager.run_finalizer()).detach();
    let watcher = fs.watch()?;
    println!("Watching {:?}", watcher.watched_directories());

    let banner = manager.get::<String>("Banner")?;
    for event in pump(&manager, &scheduler) {
        println!("{:?}", event);
    }

    for revision in ["second draft", "final copy"] {
        fs.write_container("Banner", &text(revision))?;
        for event in pump(&manager, &scheduler) {
            println!("{:?}", event);
        }
        println!("Banner v{}: {:?}", banner.version(), banner.asset()?);
    }

    let mut broken = WritableContainer::new();
    broken.set_loader("missing-loader");
    fs.write_container("Banner", &broken)?;
    for event in pump(&manager, &scheduler) {
        println!("{:?}", event);
    }
    println!("Still {:?} with {:?}", banner.state(), banner.asset()?);
    Ok(())
}

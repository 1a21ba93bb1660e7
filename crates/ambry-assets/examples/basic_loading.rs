//! Basic asset loading example.
//!
//! This example shows:
//! - Compiling containers into an in-memory store
//! - Registering a custom loader next to the built-in ones
//! - Driving finalization from a scheduler
//! - Falling back through a preference list
//! - Processing events

use ambry_assets::prelude::*;

/// A palette parsed from "r,g,b" lines.
#[derive(Debug)]
struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Asset for Palette {
    fn type_name() -> &'static str {
        "Palette"
    }
}

/// Loader for palette containers.
struct PaletteLoader;

impl AssetLoader for PaletteLoader {
    type Asset = Palette;

    fn tag(&self) -> &str {
        "palette"
    }

    async fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Palette> {
        let text = ctx.container.get_string("Data")?;
        let mut colors = Vec::new();
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let channels: Vec<u8> = line
                .split(',')
                .map(|c| c.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .map_err(|e| ctx.error(format!("bad color '{}': {}", line, e)))?;
            let [r, g, b] = channels[..] else {
                return Err(ctx.error(format!("expected three channels in '{}'", line)));
            };
            colors.push([r, g, b]);
        }
        Ok(Palette { colors })
    }
}

fn compile(fs: &MemoryAssetFs, name: &str, loader: &str, data: &str) -> AssetResult<()> {
    let mut container = WritableContainer::new();
    container.set_loader(loader);
    container.set_data(data.as_bytes().to_vec());
    fs.insert_container(name, &container)
}

fn main() -> AssetResult<()> {
    ambry_core::logging::init();

    let fs = MemoryAssetFs::new();
    compile(&fs, "text.Motd", TextLoader::TAG, "Welcome aboard")?;
    compile(&fs, "palette.Sunset", "palette", "255,94,77\n255,195,113\n")?;
    compile(&fs, "palette.Broken", "palette", "255,0\n")?;

    let loaders = LoaderRegistry::with_builtin().with(PaletteLoader);
    let manager = AssetManager::new(fs, loaders);
    let scheduler = Scheduler::new();
    scheduler.spawn(manager.run_finalizer()).detach();

    let motd = manager.get::<String>("text.Motd")?;
    let palette =
        manager.get_preferred::<Palette>(["palette.Broken", "palette.Missing", "palette.Sunset"])?;

    println!("Requested {} assets", manager.tracked_count());
    while !(motd.state().is_terminal() && palette.state().is_terminal()) {
        scheduler.tick();
        for event in manager.drain_events() {
            match event {
                AssetEvent::Ready { name, version } => println!("  ready: {} (v{})", name, version),
                AssetEvent::Failed { name, error } => println!("  failed: {} ({})", name, error),
                other => println!("  {:?}", other),
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    if let Some(text) = motd.asset()? {
        println!("Message of the day: {}", text);
    }
    if let Some(selected) = palette.selected() {
        let colors = palette.asset()?.map(|p| p.colors.len()).unwrap_or(0);
        println!("Using {} with {} colors", selected.name(), colors);
    }
    Ok(())
}

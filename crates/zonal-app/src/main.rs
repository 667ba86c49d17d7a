//! Zonal 命令行入口
//! 在场景文件上执行区域的增删改查

mod command;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use command::{Command, USAGE};
use zonal_core::config::ManagerConfig;
use zonal_core::geometry::Vertex;
use zonal_core::kind::{AmbientState, ProfileFilter};
use zonal_core::manager::{CreateOptions, DeleteOptions, UpdateOptions, ZoneManager};
use zonal_core::zone::{SceneId, ZoneRecord};
use zonal_file::{export_json, import_json, FileStore, FileStoreConfig};

/// 配置文件内容
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppConfig {
    manager: ManagerConfig,
    store: FileStoreConfig,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// 查询时用来展示过滤效果的"满格"天气
const OPEN_SKY: AmbientState = AmbientState {
    precipitation: 1.0,
    wind: 1.0,
    light: 1.0,
    volume: 1.0,
};

fn describe(zone: &ZoneRecord) -> String {
    let f = zone.frame();
    format!(
        "{}  {:<12} {:<12} ({:.1}, {:.1}) {:.1}x{:.1}  {} vertices{}{}",
        zone.id(),
        if zone.name().is_empty() { "-" } else { zone.name() },
        zone.kind(),
        f.x,
        f.y,
        f.width,
        f.height,
        zone.vertices().len(),
        if zone.enabled() { "" } else { "  [disabled]" },
        if zone.locked() { "  [locked]" } else { "" },
    )
}

async fn run(manager: &mut ZoneManager<FileStore>, command: Command) -> Result<()> {
    match command {
        Command::List => {
            for zone in manager.zones() {
                println!("{}", describe(zone));
            }
        }
        Command::Add { kind, name, points } => {
            let vertices = points.iter().map(|p| Vertex::new(p.x, p.y)).collect();
            let mut record = ZoneRecord::new(vertices).with_kind(kind);
            if let Some(name) = name {
                record = record.with_name(name);
            }
            let ids = manager.create(vec![record], CreateOptions::default()).await?;
            for id in ids {
                println!("{}", id);
            }
        }
        Command::Query { point } => {
            for id in manager.point_query(point.x, point.y) {
                if let Some(zone) = manager.get(id) {
                    println!("{}", describe(zone));
                }
            }
            let local = manager.ambient_at(point.x, point.y, &OPEN_SKY, &ProfileFilter);
            println!(
                "ambient: precipitation {:.2}, wind {:.2}, light {:.2}, volume {:.2}",
                local.precipitation, local.wind, local.light, local.volume
            );
        }
        Command::Select { rect } => {
            for id in manager.selection_query(&rect) {
                if let Some(zone) = manager.get(id) {
                    println!("{}", describe(zone));
                }
            }
        }
        Command::Set { patch } => {
            manager.update(vec![patch], UpdateOptions::default()).await?;
        }
        Command::Delete { ids } => {
            let deleted = manager.delete(&ids, DeleteOptions::default()).await?;
            info!("Deleted {} zones", deleted.len());
        }
        Command::Export { path } => {
            let text = export_json(manager.scene(), manager.zones())?;
            tokio::fs::write(&path, text).await?;
            info!("Exported {} zones to {}", manager.len(), path.display());
        }
        Command::Import { path } => {
            let text = tokio::fs::read_to_string(&path).await?;
            let (_, records) = import_json(&text)?;
            let options = CreateOptions {
                force_id: true,
                ..CreateOptions::default()
            };
            let ids = manager.create(records, options).await?;
            info!("Imported {} zones from {}", ids.len(), path.display());
        }
        Command::Scenes | Command::Help => {}
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let (options, command) = command::parse(std::env::args().skip(1))?;

    // 初始化日志
    let level = if options.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(options.config.as_deref())?;
    if let Some(root) = options.root {
        config.store.root = root;
    }

    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::Scenes => {
            let store = FileStore::new(config.store);
            for scene in store.list_scenes().await? {
                println!(
                    "{:<20} modified {}  ({})",
                    scene.scene,
                    scene.modified.format("%Y-%m-%d %H:%M:%S"),
                    scene.generator
                );
            }
            Ok(())
        }
        command => {
            let store = FileStore::new(config.store);
            let mut manager = ZoneManager::new(SceneId::new(options.scene), store, config.manager);
            manager.load().await?;
            run(&mut manager, command).await
        }
    }
}

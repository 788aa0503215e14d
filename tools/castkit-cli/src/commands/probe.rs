//! Probe an audio file under the data root.

use std::path::PathBuf;

use castkit_common::config::AppConfig;
use castkit_common::sandbox::SandboxedPath;

use super::context::Context;

pub async fn run(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let audio = SandboxedPath::new(&config.data_root, &path)?;
    let info = ctx.engine.probe(&audio).await?;

    println!("{}", audio.relative().display());
    println!("  Duration: {:.3}s", info.duration_secs);
    println!("  Format:   {}", info.format_name);
    println!("  MIME:     {}", info.mime);
    println!("  Size:     {} bytes", info.size_bytes);
    Ok(())
}

//! Check external tools and configuration.

use castkit_audio_engine::tool::command_exists;
use castkit_common::config::{config_file_path, AppConfig, TranscriptionProviderKind};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("castkit System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        (config.tools.ffmpeg.as_str(), true),
        (config.tools.ffprobe.as_str(), true),
        (config.tools.audiowaveform.as_str(), false),
    ];
    let mut required_ok = true;
    for (binary, required) in tools {
        match (command_exists(binary), required) {
            (true, _) => println!("[OK] {binary}"),
            (false, true) => {
                required_ok = false;
                println!("[MISSING] {binary} (required for editing and rendering)");
            }
            (false, false) => println!("[WARN] {binary} not found, waveforms will be skipped"),
        }
    }

    println!();
    println!("Config file: {}", config_file_path().display());
    println!("Data root:   {}", config.data_root.display());

    let provider = &config.transcription;
    match provider.provider {
        TranscriptionProviderKind::None => println!("[WARN] Transcription: not configured"),
        TranscriptionProviderKind::SelfHosted => match &provider.self_hosted_url {
            Some(url) => println!("[OK] Transcription: self-hosted at {url}"),
            None => println!("[WARN] Transcription: self-hosted selected but no URL set"),
        },
        TranscriptionProviderKind::Cloud => {
            if provider.cloud_api_key.is_some() {
                println!(
                    "[OK] Transcription: cloud ({}, model {})",
                    provider.cloud_url, provider.cloud_model
                );
            } else {
                println!("[WARN] Transcription: cloud selected but no API key set");
            }
        }
    }

    match &config.publishing.hub_url {
        Some(hub) => println!("[OK] Publishing hub: {hub}"),
        None => println!("[--] Publishing hub: none"),
    }

    println!();
    if required_ok {
        println!("All required tools are available. castkit is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set tools.* in the config.");
    }
    Ok(())
}

//! Resolve a [`BroadcastConfig`] from the JSON file and command-line flags.

use std::path::{Path, PathBuf};

use clap::ArgMatches;
use onair_lib::{BroadcastConfig, ConfigError};

/// Layer flags (and their `ONAIR_*` env fallbacks) over the config file,
/// which itself falls back to built-in defaults.
pub fn resolve(args: &ArgMatches) -> Result<BroadcastConfig, ConfigError> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => BroadcastConfig::from_json_file(Path::new(path))?,
        None => BroadcastConfig::default(),
    };

    if let Some(track) = args.get_one::<String>("track") {
        config.track_path = PathBuf::from(track);
    }
    if let Some(dir) = args.get_one::<String>("fx-dir") {
        config.fx_dir = PathBuf::from(dir);
    }
    if let Some(dir) = args.get_one::<String>("public-dir") {
        config.public_dir = PathBuf::from(dir);
    }
    if let Some(host) = args.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = args.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(bit_rate) = args.get_one::<u64>("fallback-bit-rate") {
        config.fallback_bit_rate = *bit_rate;
    }
    if let Some(volume) = args.get_one::<String>("song-volume") {
        config.song_volume = volume.clone();
    }
    if let Some(volume) = args.get_one::<String>("fx-volume") {
        config.fx_volume = volume.clone();
    }
    if let Some(format) = args.get_one::<String>("audio-format") {
        config.audio_format = format.clone();
    }
    if let Some(media_type) = args.get_one::<String>("media-type") {
        config.audio_media_type = media_type.clone();
    }
    if let Some(program) = args.get_one::<String>("mixer") {
        config.mixer_program = program.clone();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;
    use std::fs;

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onair.json");
        fs::write(&path, r#"{ "port": 4000, "fx_volume": "0.5", "mixer_program": "sox-ng" }"#)
            .unwrap();

        let matches = build_cli()
            .try_get_matches_from([
                "onair",
                "--config",
                path.to_str().unwrap(),
                "--port",
                "5000",
            ])
            .unwrap();
        let config = resolve(&matches).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.fx_volume, "0.5");
        assert_eq!(config.mixer_program, "sox-ng");
        assert_eq!(config.fallback_bit_rate, 128_000);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let matches = build_cli()
            .try_get_matches_from(["onair", "--config", "/nonexistent/onair.json"])
            .unwrap();
        assert!(matches!(resolve(&matches), Err(ConfigError::Io { .. })));
    }
}

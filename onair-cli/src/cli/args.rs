//! CLI argument definitions for `onair`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("onair")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Broadcast a track to HTTP listeners and splice sound effects in live")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .env("ONAIR_CONFIG")
                .help("Path to a JSON file with broadcast settings"),
        )
        .arg(
            Arg::new("track")
                .long("track")
                .short('t')
                .value_name("PATH")
                .env("ONAIR_TRACK")
                .help("The track to broadcast"),
        )
        .arg(
            Arg::new("fx-dir")
                .long("fx-dir")
                .value_name("DIR")
                .env("ONAIR_FX_DIR")
                .help("Directory holding the sound effects"),
        )
        .arg(
            Arg::new("public-dir")
                .long("public-dir")
                .value_name("DIR")
                .env("ONAIR_PUBLIC_DIR")
                .help("Directory served as static files"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("ADDR")
                .env("ONAIR_HOST")
                .help("Address to bind the HTTP server to"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .env("ONAIR_PORT")
                .value_parser(clap::value_parser!(u16))
                .help("Port to bind the HTTP server to"),
        )
        .arg(
            Arg::new("fallback-bit-rate")
                .long("fallback-bit-rate")
                .value_name("BITS")
                .env("ONAIR_FALLBACK_BIT_RATE")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Bit rate used when the track cannot be probed"),
        )
        .arg(
            Arg::new("song-volume")
                .long("song-volume")
                .value_name("GAIN")
                .env("ONAIR_SONG_VOLUME")
                .help("Mixer volume applied to the track while an effect plays"),
        )
        .arg(
            Arg::new("fx-volume")
                .long("fx-volume")
                .value_name("GAIN")
                .env("ONAIR_FX_VOLUME")
                .help("Mixer volume applied to the effect"),
        )
        .arg(
            Arg::new("audio-format")
                .long("audio-format")
                .value_name("TYPE")
                .env("ONAIR_AUDIO_FORMAT")
                .help("Container type passed to the mixer (e.g. mp3)"),
        )
        .arg(
            Arg::new("media-type")
                .long("media-type")
                .value_name("MIME")
                .env("ONAIR_MEDIA_TYPE")
                .help("Content-Type of the /stream response"),
        )
        .arg(
            Arg::new("mixer")
                .long("mixer")
                .value_name("PROGRAM")
                .env("ONAIR_MIXER")
                .help("Mixer executable (sox compatible)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .short('l')
                .value_name("LEVEL")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .help("Log verbosity; defaults to RUST_LOG, then info"),
        )
        .arg(
            Arg::new("autostart")
                .long("autostart")
                .action(ArgAction::SetTrue)
                .help("Start broadcasting as soon as the server is up"),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("config-json")
                        .about("Print the default broadcast configuration as JSON"),
                ),
        )
}

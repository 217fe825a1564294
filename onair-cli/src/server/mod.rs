//! # Broadcast HTTP server
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | Redirects to `/home` |
//! | `/home` | Listener page |
//! | `/controller` | Operator page (`GET`) and command endpoint (`POST`) |
//! | `/stream` | Live audio stream, one listener per request |
//! | `/status` | Engine diagnostics as JSON |
//!
//! Every other `GET` is served from the public directory.

mod error;
mod routes;
mod stream;

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    http::{StatusCode, Uri},
    routing::{get, get_service},
    Router,
};
use log::info;
use onair_lib::BroadcastEngine;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};

use crate::logging::LogBuffer;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BroadcastEngine>,
    pub logs: LogBuffer,
}

/// Build the router with all endpoints over `state`.
pub fn router(state: AppState) -> Router {
    let public_dir = state.engine.config().public_dir.clone();

    let static_root = public_dir.clone();
    let static_files = get_service(ServeDir::new(&public_dir)).fallback(move |uri: Uri| {
        let exists = static_file_exists(&static_root, uri.path());
        async move {
            if exists {
                StatusCode::METHOD_NOT_ALLOWED
            } else {
                StatusCode::NOT_FOUND
            }
        }
    });

    Router::new()
        .route("/", get(routes::redirect_home))
        .route_service("/home", ServeFile::new(public_dir.join("home/index.html")))
        .route(
            "/controller",
            get_service(ServeFile::new(public_dir.join("controller/index.html")))
                .post(routes::handle_command),
        )
        .route("/stream", get(stream::handle_stream))
        .route("/status", get(routes::status))
        .with_state(state)
        .fallback_service(static_files)
}

/// Whether `path` names a regular file under `root`. Paths leaving `root`
/// never match.
fn static_file_exists(root: &Path, path: &str) -> bool {
    let mut file = PathBuf::from(root);
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => file.push(part),
            _ => return false,
        }
    }
    file.is_file()
}

/// Bind the configured address and serve until the process exits.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let config = state.engine.config();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::io::{self, Read};
    use std::path::Path;
    use std::sync::Arc;

    use onair_lib::{BroadcastConfig, BroadcastEngine, MergeFailure, Mixer, MixerError, Source};
    use tempfile::TempDir;

    use super::AppState;

    /// Probes a fixed rate and prefixes merges with a short jingle.
    pub(crate) struct JingleMixer;

    impl Mixer for JingleMixer {
        fn probe_bit_rate(&self, _path: &Path) -> Result<u64, MixerError> {
            Ok(64_000)
        }

        fn merge(&self, base: Source, _effect: &Path) -> Result<Source, MergeFailure> {
            Ok(Box::new(io::Cursor::new(b"jingle".to_vec()).chain(base)))
        }
    }

    /// App state over a temp tree with a public dir, a track and one effect.
    pub(crate) fn app_state() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("public/home")).unwrap();
        fs::create_dir_all(root.join("public/controller")).unwrap();
        fs::write(root.join("public/home/index.html"), "<h1>home</h1>").unwrap();
        fs::write(root.join("public/controller/index.html"), "<h1>controller</h1>").unwrap();
        fs::write(root.join("public/style.css"), "body {}").unwrap();
        fs::create_dir(root.join("fx")).unwrap();
        fs::write(root.join("fx/Applause Sound Effect.mp3"), b"fx").unwrap();
        fs::write(root.join("track.mp3"), vec![7u8; 200_000]).unwrap();

        let config = BroadcastConfig {
            track_path: root.join("track.mp3"),
            fx_dir: root.join("fx"),
            public_dir: root.join("public"),
            chunk_size: 1000,
            ..BroadcastConfig::default()
        };
        let engine = Arc::new(BroadcastEngine::new(config, Arc::new(JingleMixer)));
        let state = AppState {
            engine,
            logs: Default::default(),
        };
        (dir, state)
    }
}

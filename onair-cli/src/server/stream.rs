use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use log::info;
use onair_lib::{BroadcastEngine, ListenerId};
use tokio_stream::wrappers::ReceiverStream;

use super::AppState;

/// Unregisters the listener once the response body is dropped, which is
/// what hyper does when the client goes away.
struct ListenerGuard {
    engine: Arc<BroadcastEngine>,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        info!("closing connection of {}", self.id);
        self.engine.unregister_listener(self.id);
    }
}

/// Chunks for one listener.
struct ListenerBody {
    chunks: ReceiverStream<Bytes>,
    _guard: ListenerGuard,
}

impl Stream for ListenerBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.chunks).poll_next(cx).map(|chunk| chunk.map(Ok))
    }
}

/// Handles requests to `/stream`: one chunked audio response per listener.
pub async fn handle_stream(State(state): State<AppState>) -> Response {
    let (id, stream) = state.engine.register_listener();
    info!("listener {} connected", id);

    let body = ListenerBody {
        chunks: ReceiverStream::new(stream.into_inner()),
        _guard: ListenerGuard {
            engine: state.engine.clone(),
            id,
        },
    };

    let media_type = state.engine.config().audio_media_type.clone();
    (
        [(header::CONTENT_TYPE, media_type)],
        Body::from_stream(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::testing::app_state;
    use axum::http::StatusCode;
    use futures::StreamExt;

    #[tokio::test]
    async fn listener_lives_as_long_as_its_response() {
        let (_dir, state) = app_state();

        let response = handle_stream(State(state.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(state.engine.registry().len(), 1);

        drop(response);
        assert!(state.engine.registry().is_empty());
    }

    #[tokio::test]
    async fn response_body_carries_the_broadcast() {
        let (_dir, state) = app_state();
        let response = handle_stream(State(state.clone())).await;
        let mut body = response.into_body().into_data_stream();

        state.engine.start().unwrap();
        let chunk = body.next().await.unwrap().unwrap();

        assert!(!chunk.is_empty());
        assert!(chunk.iter().all(|&byte| byte == 7));
        state.engine.stop();
    }
}

//! Feed thread moving bytes from a source through the throttle gate.

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};

use super::{Gate, Shared};
use crate::Source;

/// Run the read/admit/consume loop until the source is exhausted, the
/// throttle ends, or a detach request takes the source back.
pub(super) fn run(shared: Arc<Shared>, mut source: Source) {
    let mut buf = vec![0_u8; shared.chunk_size];

    loop {
        match shared.interrupt() {
            Some(Gate::Detach(reply)) => {
                debug!("source detached between chunks");
                let _ = reply.send(source);
                return;
            }
            Some(Gate::Ended) => {
                shared.retire(source, false);
                return;
            }
            Some(Gate::Open) | None => {}
        }

        let read = match source.read(&mut buf) {
            Ok(0) => {
                info!("source exhausted after {} bytes", shared.bytes_sent());
                shared.retire(source, true);
                return;
            }
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("source read failed: {}", err);
                shared.retire(source, true);
                return;
            }
        };

        let chunk = Bytes::copy_from_slice(&buf[..read]);
        match shared.admit(chunk.len()) {
            Gate::Open => {
                shared.sink.consume(chunk);
            }
            Gate::Detach(reply) => {
                debug!("source detached holding {} unsent bytes", chunk.len());
                let rest: Source = Box::new(Cursor::new(chunk).chain(source));
                let _ = reply.send(rest);
                return;
            }
            Gate::Ended => {
                shared.retire(source, false);
                return;
            }
        }
    }
}

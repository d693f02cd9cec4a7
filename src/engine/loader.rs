// src/engine/loader.rs
//
// Container loading: stream bytes -> decode context -> item ids -> primary.
// A ReadState only ever exists fully populated.

use crate::codecs::{Codec, DecodeContext};
use crate::engine::io::read_remaining;
use crate::engine::navigator::SequencePosition;
use crate::error::{HandlerError, Result};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw file bytes plus the decode context opened over them.
///
/// The context holds its own reference to the bytes, so they outlive it.
pub struct Container<X> {
    data: Arc<Vec<u8>>,
    context: X,
}

impl<X: DecodeContext> Container<X> {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn context(&self) -> &X {
        &self.context
    }
}

/// Everything the read side needs once a container has been loaded.
pub struct ReadState<X> {
    container: Container<X>,
    position: SequencePosition,
}

impl<X: DecodeContext> ReadState<X> {
    pub fn container(&self) -> &Container<X> {
        &self.container
    }

    pub fn position(&self) -> &SequencePosition {
        &self.position
    }

    pub fn position_mut(&mut self) -> &mut SequencePosition {
        &mut self.position
    }

    /// Dimensions of the current item, without decoding it.
    pub fn current_dimensions(&self) -> Result<(u32, u32)> {
        self.container
            .context
            .item_dimensions(self.position.current_id())
    }
}

/// Read the rest of `reader` and open it as a container.
pub fn load_container<C: Codec, R: Read + ?Sized>(
    codec: &C,
    reader: &mut R,
) -> Result<ReadState<C::Context>> {
    let data = read_remaining(reader)?;
    open_container(codec, data)
}

/// Open `data` as a container and position it on the primary item.
pub fn open_container<C: Codec>(codec: &C, data: Vec<u8>) -> Result<ReadState<C::Context>> {
    if data.is_empty() {
        debug!(target: "heif_handler::loader", "stream contained no data");
        return Err(HandlerError::EmptyStream);
    }
    let data = Arc::new(data);

    let context = codec.open_from_memory(Arc::clone(&data)).map_err(|e| {
        warn!(target: "heif_handler::loader", codec = codec.name(), error = %e, "failed to open container");
        e
    })?;

    let declared = context.top_level_item_count();
    let ids = context.top_level_item_ids();
    if declared < 0 || ids.len() != declared as usize {
        warn!(
            target: "heif_handler::loader",
            declared,
            listed = ids.len(),
            "item id list does not match image count"
        );
        return Err(HandlerError::item_count_mismatch(declared as i64, ids.len()));
    }

    let primary = context.primary_item_id().map_err(|e| {
        warn!(target: "heif_handler::loader", error = %e, "no primary image");
        e
    })?;
    let position = SequencePosition::at_item(ids, primary).ok_or_else(|| {
        warn!(target: "heif_handler::loader", %primary, "primary image not in id list");
        HandlerError::primary_item_not_found(primary)
    })?;

    debug!(
        target: "heif_handler::loader",
        bytes = data.len(),
        count = position.count(),
        current = position.current_index(),
        "container loaded"
    );

    Ok(ReadState {
        container: Container { data, context },
        position,
    })
}

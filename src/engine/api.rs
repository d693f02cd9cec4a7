// src/engine/api.rs
//
// ImageHandler: the stateful front end tying sniffing, loading, sequence
// navigation, decoding and encoding to one device.

use crate::codecs::Codec;
use crate::engine::decoder::{decode_item, DecodedImage};
use crate::engine::encoder::{encode_rgba, to_rgba8, RgbaView};
use crate::engine::loader::{load_container, ReadState};
use crate::engine::sniffer::{sniff, Format};
use crate::error::{HandlerError, Result};
use crate::options::{HandlerConfig, ImageOption, OptionValue, Quality};
use image::{DynamicImage, RgbaImage};
use std::io::{Read, Seek, Write};
use tracing::{debug, warn};

/// Reads HEIF-family containers from, and writes them to, one device.
///
/// Read side: `can_read` sniffs the header, `load` parses the container once
/// per device, `read` decodes the current item. Write side: `write` encodes
/// a bitmap into a new container on the device.
///
/// Replacing the device discards everything loaded from the previous one.
///
/// Usage:
/// ```ignore
/// let mut handler = ImageHandler::with_device(LibHeif::new()?, File::open(path)?);
/// if handler.can_read() {
///     let frame = handler.read_image()?;
///     while handler.jump_to_next().is_ok() {
///         let next = handler.read_image()?;
///     }
/// }
/// ```
pub struct ImageHandler<S, C: Codec> {
    codec: C,
    device: Option<S>,
    read_state: Option<ReadState<C::Context>>,
    format: Format,
    config: HandlerConfig,
}

impl<S, C: Codec> ImageHandler<S, C> {
    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    pub fn new(codec: C) -> Self {
        Self::with_config(codec, HandlerConfig::default())
    }

    pub fn with_config(codec: C, config: HandlerConfig) -> Self {
        Self {
            codec,
            device: None,
            read_state: None,
            format: Format::None,
            config,
        }
    }

    pub fn with_device(codec: C, device: S) -> Self {
        let mut handler = Self::new(codec);
        handler.device = Some(device);
        handler
    }

    // =========================================================================
    // DEVICE
    // =========================================================================

    /// Attach a new device. Any loaded container is discarded.
    pub fn set_device(&mut self, device: S) {
        self.invalidate();
        self.device = Some(device);
    }

    /// Detach the device. Any loaded container is discarded.
    pub fn take_device(&mut self) -> Option<S> {
        self.invalidate();
        self.device.take()
    }

    pub fn device(&self) -> Option<&S> {
        self.device.as_ref()
    }

    fn invalidate(&mut self) {
        if self.read_state.take().is_some() {
            debug!(target: "heif_handler::api", "device changed, dropping loaded container");
        }
        self.format = Format::None;
    }

    // =========================================================================
    // STATE & CONFIGURATION
    // =========================================================================

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut HandlerConfig {
        &mut self.config
    }

    /// Sub-format recorded by the last successful `can_read`.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.config.quality
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.config.quality = quality;
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state.is_some()
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Index of the current item, `None` until a container is loaded.
    pub fn current_index(&self) -> Option<usize> {
        self.read_state
            .as_ref()
            .map(|state| state.position().current_index())
    }

    /// Number of top-level items, 0 until a container is loaded.
    pub fn count(&self) -> usize {
        self.read_state
            .as_ref()
            .map_or(0, |state| state.position().count())
    }

    /// Make item `index` current. Does not load; fails if nothing is loaded
    /// or `index` is out of range, leaving the position unchanged.
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        self.loaded_state_mut("jump_to")?
            .position_mut()
            .jump_to(index)
    }

    pub fn jump_to_next(&mut self) -> Result<()> {
        self.loaded_state_mut("jump_to_next")?
            .position_mut()
            .jump_to_next()
    }

    fn loaded_state_mut(&mut self, op: &'static str) -> Result<&mut ReadState<C::Context>> {
        self.read_state.as_mut().ok_or_else(|| {
            warn!(target: "heif_handler::api", op, "no container loaded");
            HandlerError::NotLoaded
        })
    }

    // =========================================================================
    // OPTIONS
    // =========================================================================

    pub fn supports_option(&self, option: ImageOption) -> bool {
        option.is_supported()
    }

    /// `Quality` always answers; `Size` only while a container is loaded.
    pub fn option(&self, option: ImageOption) -> Option<OptionValue> {
        match option {
            ImageOption::Quality => Some(OptionValue::Int(self.config.quality.value() as i64)),
            ImageOption::Size => {
                let (width, height) = self.read_state.as_ref()?.current_dimensions().ok()?;
                Some(OptionValue::Size { width, height })
            }
            _ => None,
        }
    }

    /// Only `Quality` is settable. Values that are not integers in
    /// `[0, 100]` are ignored.
    pub fn set_option(&mut self, option: ImageOption, value: OptionValue) {
        if option != ImageOption::Quality {
            return;
        }
        match value.to_int().and_then(Quality::new) {
            Some(quality) => self.config.quality = quality,
            None => {
                debug!(target: "heif_handler::api", ?value, "ignoring invalid quality");
            }
        }
    }
}

impl<S: Read + Seek, C: Codec> ImageHandler<S, C> {
    /// Classify `device` at its current position without consuming it.
    pub fn can_read_from(device: &mut S) -> Format {
        sniff(device)
    }

    /// Sniff the attached device and record the sub-format it carries.
    pub fn can_read(&mut self) -> bool {
        let Some(device) = self.device.as_mut() else {
            return false;
        };
        let format = sniff(device);
        if format.is_recognized() {
            self.format = format;
        }
        format.is_recognized()
    }

    /// Parse the device's container. Runs at most once per device.
    pub fn load(&mut self) -> Result<()> {
        if self.read_state.is_some() {
            return Ok(());
        }
        let device = attached(&mut self.device, "load")?;
        let state = load_container(&self.codec, device)?;
        self.read_state = Some(state);
        Ok(())
    }

    /// Load if needed, then decode the current item.
    pub fn read(&mut self) -> Result<DecodedImage<C::Image>> {
        self.load()?;
        let state = self.read_state.as_ref().ok_or(HandlerError::NotLoaded)?;
        decode_item(
            state.container().context(),
            state.position().current_id(),
            &self.config.limits,
        )
    }

    /// [`read`](Self::read) into an owned, packed `RgbaImage`.
    pub fn read_image(&mut self) -> Result<RgbaImage> {
        self.read()?.into_rgba_image()
    }
}

impl<S: Write, C: Codec> ImageHandler<S, C> {
    /// Encode `image` into a new container on the device.
    pub fn write(&mut self, image: &DynamicImage) -> Result<()> {
        let rgba = to_rgba8(image);
        self.write_rgba(RgbaView::from(&*rgba))
    }

    /// Encode strided RGBA pixels into a new container on the device.
    pub fn write_rgba(&mut self, view: RgbaView<'_>) -> Result<()> {
        let device = attached(&mut self.device, "write")?;
        encode_rgba(&self.codec, view, &self.config, device)?;
        Ok(())
    }
}

fn attached<'a, S>(device: &'a mut Option<S>, op: &'static str) -> Result<&'a mut S> {
    device.as_mut().ok_or_else(|| {
        warn!(target: "heif_handler::api", op, "no device attached");
        HandlerError::NoDevice
    })
}

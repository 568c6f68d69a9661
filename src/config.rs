//! Construction-time codec options. Blink has no external config file;
//! this is the ambient "configuration" concern for a codec instance,
//! analogous to the hard-coded constants (`DEFAULT_BLOCK_SIZE`) and
//! builder defaults the teacher bakes into `msf.rs`.

/// Width, in bytes, reserved for the frame-size slot the framed codec
/// frontend backpatches after writing a message's payload (see
/// `framing::write_preamble`). `0xC0 | width` plus `width` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizeWidth(pub u8);

impl Default for FrameSizeWidth {
    fn default() -> Self {
        // 3 size bytes covers frames up to 16MiB, matching the teacher's
        // canonical 4-byte reserved slot (1 header byte + 3 size bytes).
        FrameSizeWidth(3)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CodecOptions {
    /// Width of the reserved frame-size slot. Larger payloads than this
    /// width allows fail encoding with `FrameTooLarge`.
    pub frame_size_width: FrameSizeWidth,
    /// When `true`, an unrecognized enum value decodes to `Value::Enum`
    /// verbatim instead of failing with `InvalidEnumValue`.
    pub lenient_enum_decode: bool,
    /// Initial capacity, in bytes, of each pooled internal-buffer segment.
    pub segment_size: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            frame_size_width: FrameSizeWidth::default(),
            lenient_enum_decode: false,
            segment_size: 4096,
        }
    }
}

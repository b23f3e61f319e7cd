use thiserror::Error;

/// I/O errors that can occur when reading or writing TIFF files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from the local filesystem
    #[error("File error: {0}")]
    File(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// Error while writing output
    #[error("Write error: {0}")]
    Write(String),
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(e.to_string())
        } else {
            IoError::File(e.to_string())
        }
    }
}

/// Errors that can occur when parsing, decoding or encoding TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading or writing the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// BigTIFF reserved header field (bytes 6-7) is not zero
    #[error("Improperly formatted BigTIFF: bytes 6-7 must be zero, got {0}")]
    NonZeroReserved(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Directory index past the end of the chain
    #[error("Directory {index} does not exist (file has {count})")]
    DirectoryNotFound { index: usize, count: usize },

    /// Tile or strip index outside the directory layout
    #[error("Chunk {index} out of range (directory has {count})")]
    ChunkOutOfRange { index: usize, count: usize },

    /// Compressed data could not be decoded
    #[error("Failed to decode chunk: {0}")]
    Decode(String),

    /// Chunk data could not be encoded
    #[error("Failed to encode chunk: {0}")]
    Encode(String),
}

impl From<std::io::Error> for TiffError {
    fn from(e: std::io::Error) -> Self {
        TiffError::Io(IoError::from(e))
    }
}

/// Violations of engine preconditions.
///
/// These are caller mistakes (wrong input shape or a misconfigured
/// destination) rather than bad bytes on disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// Pixels requested before a successful raster read
    #[error("Image has not been rasterized")]
    NotRasterized,

    /// Pixel coordinate outside the raster
    #[error("Pixel ({x}, {y}) outside {width}x{height} raster")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    /// Channel index outside the mode's channel count
    #[error("Channel {channel} outside pixel with {channels} channel(s)")]
    ChannelOutOfBounds { channel: usize, channels: usize },

    /// Output tile dimensions must be multiples of 16
    #[error("Tile dimensions {width}x{height} must both be multiples of 16")]
    TileNotMultipleOf16 { width: u32, height: u32 },

    /// Tile or scanline sizes differ between sources
    #[error("Chunk size mismatch: directory {directory} has {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        directory: usize,
        expected: usize,
        actual: usize,
    },

    /// Source directory is not 8-bit min-is-black grayscale
    #[error("Directory {directory} is not 8-bit min-is-black (bits {bits}, photometric {photometric})")]
    NotGray8 {
        directory: usize,
        bits: u16,
        photometric: u16,
    },

    /// No pixel mode for the given sample layout
    #[error("Unsupported pixel layout: {samples} sample(s) of {bits} bit(s)")]
    UnsupportedMode { samples: u16, bits: u16 },

    /// Raster mode does not match the destination directory
    #[error("Mode mismatch: raster is {raster}, destination is {destination}")]
    ModeMismatch {
        raster: &'static str,
        destination: &'static str,
    },

    /// Layout the raster paths cannot address
    #[error("Unsupported layout for directory {directory}: {reason}")]
    UnsupportedLayout { directory: usize, reason: String },

    /// Operation requires tile organization
    #[error("Directory {0} is not tiled")]
    NotTiled(usize),

    /// Sources or destination disagree on dimensions or organization
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// No channels selected for composition
    #[error("No channels selected")]
    NoChannelsSelected,

    /// Selected channel is past the end of the palette
    #[error("Max channel {channel} is larger than number of channels in the palette ({palette})")]
    ChannelNotInPalette { channel: usize, palette: usize },

    /// Selected channel is past the last directory of the image
    #[error("Max channel {channel} is larger than number of channels in the image ({directories})")]
    ChannelNotInImage { channel: usize, directories: usize },

    /// Wrong number of merge sources
    #[error("Gray to RGB merge needs 2 or 3 sources, got {0}")]
    SourceCount(usize),

    /// Scale factor outside (0, 1]
    #[error("Scale factor must be in (0, 1], got {0}")]
    InvalidScale(String),
}

/// Errors raised while loading a palette description
#[derive(Debug, Clone, Error)]
pub enum PaletteError {
    /// Palette file could not be read
    #[error("Failed to read palette {path}: {message}")]
    Read { path: String, message: String },

    /// A line did not have the expected seven fields
    #[error("Palette line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Broad classification of a [`RasterError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or unsupported file content
    Format,
    /// Failed tile/scanline transfer or file access
    Io,
    /// Caller-side precondition violation
    Precondition,
    /// Worker threads or other process resources unavailable
    Resource,
}

/// Errors surfaced by the raster engine (reader, writer, compositors, copier)
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// TIFF format or codec error outside a tile/scanline transfer
    #[error("Format error: {0}")]
    Format(#[from] TiffError),

    /// Tile read failed
    #[error("Error reading tile at ({x}, {y}): {source}")]
    TileRead { x: u32, y: u32, source: TiffError },

    /// Scanline read failed
    #[error("Error reading line at row {row}: {source}")]
    ScanlineRead { row: u32, source: TiffError },

    /// Tile write failed
    #[error("Error writing tile at ({x}, {y}): {source}")]
    TileWrite { x: u32, y: u32, source: TiffError },

    /// Scanline write failed
    #[error("Error writing line at row {row}: {source}")]
    ScanlineWrite { row: u32, source: TiffError },

    /// Precondition violation
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Palette could not be loaded
    #[error("Palette error: {0}")]
    Palette(#[from] PaletteError),

    /// Worker thread pool could not be started
    #[error("Failed to start thread pool: {0}")]
    ThreadPool(String),
}

impl RasterError {
    /// Classify the error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RasterError::Format(TiffError::Io(_)) => ErrorKind::Io,
            RasterError::Format(_) => ErrorKind::Format,
            RasterError::TileRead { .. }
            | RasterError::ScanlineRead { .. }
            | RasterError::TileWrite { .. }
            | RasterError::ScanlineWrite { .. } => ErrorKind::Io,
            RasterError::Precondition(_) => ErrorKind::Precondition,
            RasterError::Palette(PaletteError::Read { .. }) => ErrorKind::Io,
            RasterError::Palette(PaletteError::Malformed { .. }) => ErrorKind::Format,
            RasterError::ThreadPool(_) => ErrorKind::Resource,
        }
    }
}

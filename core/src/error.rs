//! Hand-rolled error types for each layer, matching the taxonomy in the
//! error-handling design: locally recoverable failures never leave the
//! component that can handle them, everything else keeps its own
//! discriminant all the way to the caller.

use core::fmt;

/// Failure from a [`crate::bus::BusDriver`] implementation. Generic over the
/// driver's own error so the emulator (`std::io::Error`) and a real GPIO
/// driver (register access failure) don't have to share a type.
#[derive(Debug)]
pub struct BusError<E>(pub E);

impl<E: fmt::Display> fmt::Display for BusError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus driver error: {}", self.0)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for BusError<E> {}

/// Failure from the command layer. The wire layer never retries; timeouts
/// and failing status bytes are reported through the `bool`/`Option`
/// return values of each command, not this type. `Fault` is reserved for
/// the underlying bus driver actually failing (stuck pin, unreadable
/// register, etc.), which is a harder failure than a timeout.
#[derive(Debug)]
pub enum CommandError<E> {
    Fault(BusError<E>),
}

impl<E: fmt::Display> fmt::Display for CommandError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Fault(e) => write!(f, "command layer fault: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CommandError<E> {}

impl<E> From<BusError<E>> for CommandError<E> {
    fn from(e: BusError<E>) -> Self {
        CommandError::Fault(e)
    }
}

/// Fatal block-manager errors: each one indicates either an
/// un-initializable chip or allocator corruption; none are recoverable by
/// the block manager itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockManagerError {
    /// `init()` found zero chips answering READ ID.
    NoActiveChip,
    /// A page-0 byte could not be read during the bad-block scan.
    BadBlockCheckFailed { chip: u8, block: u16 },
    /// `alloc()` scanned every block on every chip and found nothing free.
    NoFreeBlock,
    /// Attempted to allocate a block already marked allocated.
    AlreadyAllocated { chip: u8, block: u16 },
    /// Attempted to free a block that was not allocated.
    AlreadyFree { chip: u8, block: u16 },
    /// Attempted to free a block that is marked bad (bad blocks stay
    /// allocated for life).
    FreeingBadBlock { chip: u8, block: u16 },
}

impl fmt::Display for BlockManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockManagerError::NoActiveChip => write!(f, "no active chip responded to READ ID"),
            BlockManagerError::BadBlockCheckFailed { chip, block } => {
                write!(f, "bad-block check failed: chip={chip} block={block}")
            }
            BlockManagerError::NoFreeBlock => write!(f, "no free block"),
            BlockManagerError::AlreadyAllocated { chip, block } => {
                write!(f, "block already allocated: chip={chip} block={block}")
            }
            BlockManagerError::AlreadyFree { chip, block } => {
                write!(f, "block already free: chip={chip} block={block}")
            }
            BlockManagerError::FreeingBadBlock { chip, block } => {
                write!(f, "cannot free bad block: chip={chip} block={block}")
            }
        }
    }
}

impl std::error::Error for BlockManagerError {}

/// Why a page codec decode could not produce a verified payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// ECC correction found more errors than it can fix within a sector.
    UncorrectableEcc { sector: u8 },
    /// CRC mismatch after ECC correction.
    CrcMismatch,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UncorrectableEcc { sector } => {
                write!(f, "uncorrectable ECC error in sector {sector}")
            }
            CodecError::CrcMismatch => write!(f, "CRC mismatch after ECC correction"),
        }
    }
}

impl std::error::Error for CodecError {}

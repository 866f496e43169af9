use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

// Loader errors

/// Failure to turn a file into a runnable [`Image`](crate::Image).
#[derive(Debug, Error, Diagnostic)]
pub enum ImageError {
    #[error("Could not read program image `{}`", .path.display())]
    #[diagnostic(
        code(image::read),
        help("make sure the file exists and is readable")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Program image is {len} bytes long, too short to hold an origin word")]
    #[diagnostic(
        code(image::too_short),
        help("an image starts with a big-endian origin address, followed by program words")
    )]
    TooShort { len: usize },

    #[error("Program image is {len} bytes long, which is not aligned to 16 bits")]
    #[diagnostic(
        code(image::unaligned),
        help("every word in an image is exactly two bytes; the file may be truncated")
    )]
    Unaligned { len: usize },

    #[error("Program of {words} words at origin 0x{orig:04x} does not fit in memory")]
    #[diagnostic(
        code(image::too_long),
        help("programs must end at or before address 0xffff")
    )]
    TooLong { orig: u16, words: usize },
}

// Runtime errors

/// Fatal condition which stops the execution loop.
///
/// `addr` is always the address the faulting instruction was fetched from.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("Executed reserved opcode 0x{opcode:x} at address 0x{addr:04x}")]
    #[diagnostic(
        code(run::reserved_opcode),
        help("`RTI` (0x8) and the reserved opcode (0xD) are not supported by this machine")
    )]
    ReservedOpcode { opcode: u16, addr: u16 },

    #[error("Called a trap with an unknown vector of 0x{vector:02x} at address 0x{addr:04x}")]
    #[diagnostic(
        code(run::unknown_trap),
        help("supported vectors are 0x20 through 0x25: GETC, OUT, PUTS, IN, PUTSP and HALT")
    )]
    UnknownTrap { vector: u8, addr: u16 },

    #[error("Console I/O failed")]
    #[diagnostic(code(run::console))]
    Console(#[from] io::Error),
}

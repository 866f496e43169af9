use std::collections::VecDeque;
use std::io::{self, stdin, stdout, IsTerminal, Stdout, Write};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers as Mod},
    terminal,
};

/// Keyboard and display of the simulated machine.
///
/// Reads are byte-oriented: the machine only ever sees 8-bit characters, widened to a word.
pub trait Console {
    /// Block until one byte of input is available, then consume it.
    fn read_byte(&mut self) -> io::Result<u8>;
    /// Whether [`Console::read_byte`] would return without blocking. Must not block.
    fn input_available(&mut self) -> io::Result<bool>;
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Console attached to the process' standard input and output.
///
/// An interactive terminal is held in raw mode for as long as the console lives, so keys are
/// delivered one at a time and never echoed. Raw mode is restored on drop, and on `Ctrl+C`.
pub struct TermConsole {
    out: Stdout,
    /// Stdin is a terminal, and raw mode is enabled.
    raw: bool,
    /// Line feeds must be written as CR LF, since raw mode disables output processing.
    translate_newlines: bool,
    /// Bytes that have been read but not yet consumed.
    /// Multi-byte characters are delivered one UTF-8 byte at a time.
    pending: VecDeque<u8>,
    /// Piped input has been closed by the writer.
    eof: bool,
    line_start: bool,
}

impl TermConsole {
    /// Must only be called if terminal is NOT in raw mode.
    pub fn new() -> io::Result<Self> {
        let raw = stdin().is_terminal();
        if raw {
            debug_assert!(
                !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
                "terminal should not be in raw mode to enable raw mode",
            );
            terminal::enable_raw_mode()?;
        }
        Ok(TermConsole {
            out: stdout(),
            raw,
            translate_newlines: raw && io::stdout().is_terminal(),
            pending: VecDeque::new(),
            eof: false,
            line_start: true,
        })
    }

    /// Write a newline, unless the last byte written already ended a line.
    pub fn start_new_line(&mut self) -> io::Result<()> {
        if !self.line_start {
            self.write_byte(b'\n')?;
        }
        self.flush()
    }

    fn buffer_char(&mut self, ch: char) {
        let mut bytes = [0u8; 4];
        self.pending
            .extend(ch.encode_utf8(&mut bytes).as_bytes().iter().copied());
    }

    /// Consume terminal events until one is a character, or none are left.
    fn poll_terminal(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            if let Some(ch) = key_char(event::read()?) {
                self.buffer_char(ch);
                break;
            }
        }
        Ok(())
    }

    /// Block on terminal events until one is a character.
    fn read_terminal(&mut self) -> io::Result<()> {
        loop {
            if let Some(ch) = key_char(event::read()?) {
                self.buffer_char(ch);
                return Ok(());
            }
        }
    }

    /// Move whatever piped input is ready into `pending`. Blocks only if `wait` is set.
    fn fill_piped(&mut self, wait: bool) -> io::Result<()> {
        if self.eof || !(wait || stdin_ready()?) {
            return Ok(());
        }
        let mut buf = [0u8; 256];
        let count = read_stdin(&mut buf)?;
        if count == 0 {
            self.eof = true;
        }
        self.pending.extend(&buf[..count]);
        Ok(())
    }
}

impl Drop for TermConsole {
    fn drop(&mut self) {
        if self.raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}

impl Console for TermConsole {
    fn read_byte(&mut self) -> io::Result<u8> {
        if self.pending.is_empty() {
            // Prompts must be visible before blocking
            self.flush()?;
            if self.raw {
                self.read_terminal()?;
            } else {
                self.fill_piped(true)?;
            }
        }
        self.pending.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "console input was closed")
        })
    }

    fn input_available(&mut self) -> io::Result<bool> {
        if self.pending.is_empty() {
            if self.raw {
                self.poll_terminal()?;
            } else {
                self.fill_piped(false)?;
            }
        }
        Ok(!self.pending.is_empty())
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.line_start = byte == b'\n';
        if byte == b'\n' && self.translate_newlines {
            return self.out.write_all(b"\r\n");
        }
        self.out.write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Whether a read of stdin would return immediately, with data or end of file.
#[cfg(unix)]
fn stdin_ready() -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `fds` is a single valid pollfd for the duration of the call
    let ready = unsafe { libc::poll(&mut fds, 1, 0) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ready > 0 && fds.revents & (libc::POLLIN | libc::POLLHUP) != 0)
}

/// Read from the stdin file descriptor directly, bypassing the buffer of [`std::io::Stdin`],
/// so that [`stdin_ready`] always sees every byte not yet in `pending`.
#[cfg(unix)]
fn read_stdin(buf: &mut [u8]) -> io::Result<usize> {
    loop {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes
        let count = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        if count >= 0 {
            return Ok(count as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

// No readiness check without `poll`: piped input is read as soon as it is asked about
#[cfg(not(unix))]
fn stdin_ready() -> io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn read_stdin(buf: &mut [u8]) -> io::Result<usize> {
    use std::io::Read;
    stdin().read(buf)
}

/// Character typed by a key press, if any.
///
/// `Ctrl+C` will always return the terminal to normal state and exit.
fn key_char(event: Event) -> Option<char> {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind,
        ..
    }) = event
    else {
        return None;
    };
    if matches!(kind, KeyEventKind::Release) {
        return None;
    }
    match (modifiers, code) {
        (Mod::CONTROL, KeyCode::Char('c')) => {
            let _ = terminal::disable_raw_mode();
            println!();
            std::process::exit(130);
        }
        (_, KeyCode::Enter) => Some('\n'),
        (_, KeyCode::Backspace) => Some('\x08'),
        (_, KeyCode::Tab) => Some('\t'),
        (_, KeyCode::Esc) => Some('\x1b'),
        (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) => Some(ch),
        _ => None,
    }
}

/// In-memory console: input is queued up front, output is captured.
#[derive(Debug, Default, Clone)]
pub struct BufferedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        BufferedConsole {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Captured output, decoded lossily.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

impl Console for BufferedConsole {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.input.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no more console input")
        })
    }

    fn input_available(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

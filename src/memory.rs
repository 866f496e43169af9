use std::io;

use crate::console::Console;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register.
pub const KBDR: u16 = 0xFE02;

/// Word-addressed system memory, including the memory-mapped keyboard registers.
///
/// Any `u16` is a valid address, so accesses can never be out of range.
pub struct Memory {
    words: Box<[u16; MEMORY_MAX]>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            words: Box::new([0; MEMORY_MAX]),
        }
    }

    /// Read a word as the machine does.
    ///
    /// Reading [`KBSR`] first polls `console`: if a key is available, bit 15 of `KBSR` is set
    /// and the key is consumed into [`KBDR`]; otherwise `KBSR` is cleared. Every other address
    /// is plain storage.
    pub fn read(&mut self, addr: u16, console: &mut impl Console) -> io::Result<u16> {
        if addr == KBSR {
            if console.input_available()? {
                self.words[KBSR as usize] |= 1 << 15;
                self.words[KBDR as usize] = console.read_byte()? as u16;
            } else {
                self.words[KBSR as usize] = 0;
            }
        }
        Ok(self.words[addr as usize])
    }

    /// Overwrite a word. Never has a side effect, even for device registers.
    #[inline]
    pub fn write(&mut self, addr: u16, val: u16) {
        self.words[addr as usize] = val;
    }

    /// Read a word without triggering device side effects.
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.words[addr as usize]
    }

    /// Copy `words` into memory starting at `orig`, wrapping at the end of memory.
    pub fn load(&mut self, orig: u16, words: &[u16]) {
        let mut addr = orig;
        for word in words {
            self.write(addr, *word);
            addr = addr.wrapping_add(1);
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

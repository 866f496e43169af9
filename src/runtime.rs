use tracing::{debug, error};

use crate::console::Console;
use crate::error::RunError;
use crate::loader::Image;
use crate::memory::Memory;
use crate::trap::TrapVect;

/// Prompt written by the `IN` trap before reading.
const IN_PROMPT: &str = "Enter a character: ";

/// Represents complete machine state during runtime.
pub struct RunState<C> {
    /// System memory - 128KB in size.
    mem: Memory,
    /// Program counter
    pc: u16,
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Condition code
    flag: RunFlag,
    status: Status,
    console: C,
}

/// Condition code, set by the last flag-setting instruction.
///
/// Values line up with the `nzp` mask of a branch instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunFlag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
    /// No flag-setting instruction has run yet; no branch is taken.
    Uninit = 0b000,
}

/// State of the fetch-execute loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    /// Reached by `HALT`. Terminal.
    Halted,
    /// Reached when an instruction fails with a [`RunError`]. Terminal.
    Faulted,
}

impl<C: Console> RunState<C> {
    /// Zeroed machine, with PC at the default origin.
    pub fn new(console: C) -> RunState<C> {
        RunState {
            mem: Memory::new(),
            pc: Image::DEFAULT_ORIG,
            reg: [0; 8],
            flag: RunFlag::Uninit,
            status: Status::Running,
            console,
        }
    }

    /// Machine with `image` loaded, ready to execute from its origin.
    pub fn from_image(image: &Image, console: C) -> RunState<C> {
        let mut state = RunState::new(console);
        state.mem.load(image.orig(), image.words());
        state.pc = image.orig();
        state
    }

    const OP_TABLE: [fn(&mut Self, u16) -> Result<(), RunError>; 16] = [
        Self::br,   // 0x0
        Self::add,  // 0x1
        Self::ld,   // 0x2
        Self::st,   // 0x3
        Self::jsr,  // 0x4
        Self::and,  // 0x5
        Self::ldr,  // 0x6
        Self::str,  // 0x7
        Self::rti,  // 0x8
        Self::not,  // 0x9
        Self::ldi,  // 0xA
        Self::sti,  // 0xB
        Self::jmp,  // 0xC
        Self::res,  // 0xD
        Self::lea,  // 0xE
        Self::trap, // 0xF
    ];

    /// Run until `HALT`, or until an instruction faults.
    ///
    /// Returns the terminal status; a machine which has already faulted stays
    /// [`Status::Faulted`] without executing anything.
    pub fn run(&mut self) -> Result<Status, RunError> {
        loop {
            let status = self.step()?;
            if status != Status::Running {
                return Ok(status);
            }
        }
    }

    /// Execute a single instruction. Does nothing once halted or faulted.
    pub fn step(&mut self) -> Result<Status, RunError> {
        if self.status != Status::Running {
            return Ok(self.status);
        }
        if let Err(err) = self.execute() {
            self.status = Status::Faulted;
            error!(pc = self.pc.wrapping_sub(1), "{err}");
            return Err(err);
        }
        Ok(self.status)
    }

    fn execute(&mut self) -> Result<(), RunError> {
        let instr = self.read(self.pc)?;
        let opcode = (instr >> 12) as usize;
        // PC incremented before instruction is performed
        self.pc = self.pc.wrapping_add(1);
        Self::OP_TABLE[opcode](self, instr)
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn reg(&self, reg: u16) -> u16 {
        self.reg[(reg & 0b111) as usize]
    }

    pub fn set_reg(&mut self, reg: u16, val: u16) {
        *self.reg_mut(reg) = val;
    }

    pub fn flag(&self) -> RunFlag {
        self.flag
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    #[inline]
    fn reg_mut(&mut self, reg: u16) -> &mut u16 {
        &mut self.reg[(reg & 0b111) as usize]
    }

    #[inline]
    fn read(&mut self, addr: u16) -> Result<u16, RunError> {
        Ok(self.mem.read(addr, &mut self.console)?)
    }

    /// Extend the sign bit of the lowest `bits` bits of `val` through the whole word.
    #[inline]
    pub fn s_ext(val: u16, bits: u32) -> u16 {
        debug_assert!(bits > 0 && bits < 16);
        // Sign bit
        let sign = val & (1u16 << (bits - 1));
        // Bits lower than sign bit
        let magnitude = val & ((1u16 << bits) - 1);
        // Positive input: all bits unset; 0x0000
        // Negative input: sign bit and above will be set, lower bits will be reset
        //      Eg. bits=14 -> 0xE000
        let sign_extension = (!sign).wrapping_add(1); // sign * -1
        magnitude | sign_extension
    }

    #[inline]
    fn set_flags(&mut self, val: u16) {
        self.flag = RunFlag::of(val);
    }

    /// Write a flag-setting result to `dr`.
    #[inline]
    fn set_result(&mut self, dr: u16, val: u16) {
        *self.reg_mut(dr) = val;
        self.set_flags(val);
    }

    /// Second operand of `ADD`/`AND`: `imm5` if bit 5 is set, otherwise `SR2`.
    #[inline]
    fn alu_operand(&self, instr: u16) -> u16 {
        if instr & 0b100000 == 0 {
            // reg
            self.reg(instr & 0b111)
        } else {
            // imm
            Self::s_ext(instr, 5)
        }
    }

    /// PC-relative address from the 9-bit offset field.
    #[inline]
    fn pc_offset9(&self, instr: u16) -> u16 {
        self.pc.wrapping_add(Self::s_ext(instr, 9))
    }

    /// Base register plus the 6-bit offset field.
    #[inline]
    fn base_offset6(&self, instr: u16) -> u16 {
        let br = (instr >> 6) & 0b111;
        self.reg(br).wrapping_add(Self::s_ext(instr, 6))
    }

    fn add(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        let res = self.reg(sr).wrapping_add(self.alu_operand(instr));
        self.set_result(dr, res);
        Ok(())
    }

    fn and(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        let res = self.reg(sr) & self.alu_operand(instr);
        self.set_result(dr, res);
        Ok(())
    }

    fn not(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        self.set_result(dr, !self.reg(sr));
        Ok(())
    }

    fn br(&mut self, instr: u16) -> Result<(), RunError> {
        let flag = (instr >> 9) & 0b111;
        if self.flag as u16 & flag != 0 {
            self.pc = self.pc_offset9(instr);
        }
        Ok(())
    }

    fn jmp(&mut self, instr: u16) -> Result<(), RunError> {
        let br = (instr >> 6) & 0b111;
        self.pc = self.reg(br);
        Ok(())
    }

    fn jsr(&mut self, instr: u16) -> Result<(), RunError> {
        // Read base register first, in case it is R7 (`JSRR R7`)
        let target = if instr & 0x800 == 0 {
            // reg
            self.reg((instr >> 6) & 0b111)
        } else {
            // offs
            self.pc.wrapping_add(Self::s_ext(instr, 11))
        };
        *self.reg_mut(7) = self.pc;
        self.pc = target;
        Ok(())
    }

    fn ld(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        let val = self.read(self.pc_offset9(instr))?;
        self.set_result(dr, val);
        Ok(())
    }

    fn ldi(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        let ptr = self.read(self.pc_offset9(instr))?;
        let val = self.read(ptr)?;
        self.set_result(dr, val);
        Ok(())
    }

    fn ldr(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        let val = self.read(self.base_offset6(instr))?;
        self.set_result(dr, val);
        Ok(())
    }

    fn lea(&mut self, instr: u16) -> Result<(), RunError> {
        let dr = (instr >> 9) & 0b111;
        self.set_result(dr, self.pc_offset9(instr));
        Ok(())
    }

    fn st(&mut self, instr: u16) -> Result<(), RunError> {
        let sr = (instr >> 9) & 0b111;
        self.mem.write(self.pc_offset9(instr), self.reg(sr));
        Ok(())
    }

    fn sti(&mut self, instr: u16) -> Result<(), RunError> {
        let sr = (instr >> 9) & 0b111;
        let ptr = self.read(self.pc_offset9(instr))?;
        self.mem.write(ptr, self.reg(sr));
        Ok(())
    }

    fn str(&mut self, instr: u16) -> Result<(), RunError> {
        let sr = (instr >> 9) & 0b111;
        self.mem.write(self.base_offset6(instr), self.reg(sr));
        Ok(())
    }

    fn rti(&mut self, instr: u16) -> Result<(), RunError> {
        self.reserved(instr)
    }

    fn res(&mut self, instr: u16) -> Result<(), RunError> {
        self.reserved(instr)
    }

    fn reserved(&mut self, instr: u16) -> Result<(), RunError> {
        Err(RunError::ReservedOpcode {
            opcode: instr >> 12,
            addr: self.pc.wrapping_sub(1),
        })
    }

    fn trap(&mut self, instr: u16) -> Result<(), RunError> {
        let vect = (instr & 0xFF) as u8;
        let vect = TrapVect::try_from(vect).map_err(|vector| RunError::UnknownTrap {
            vector,
            addr: self.pc.wrapping_sub(1),
        })?;
        match vect {
            TrapVect::Getc => {
                *self.reg_mut(0) = self.console.read_byte()? as u16;
            }
            TrapVect::Out => {
                self.console.write_byte((self.reg(0) & 0xFF) as u8)?;
                self.console.flush()?;
            }
            TrapVect::Puts => {
                // Only the low byte of each word is written
                let mut addr = self.reg(0);
                loop {
                    let chr = self.mem.peek(addr);
                    if chr == 0 {
                        break;
                    }
                    self.console.write_byte((chr & 0xFF) as u8)?;
                    addr = addr.wrapping_add(1);
                }
                self.console.flush()?;
            }
            TrapVect::In => {
                for byte in IN_PROMPT.bytes() {
                    self.console.write_byte(byte)?;
                }
                self.console.flush()?;
                *self.reg_mut(0) = self.console.read_byte()? as u16;
            }
            TrapVect::Putsp => {
                let mut addr = self.reg(0);
                loop {
                    let chr = self.mem.peek(addr);
                    let [high, low] = chr.to_be_bytes();
                    if low == 0 {
                        break;
                    }
                    self.console.write_byte(low)?;
                    if high != 0 {
                        self.console.write_byte(high)?;
                    }
                    addr = addr.wrapping_add(1);
                }
                self.console.flush()?;
            }
            TrapVect::Halt => {
                self.console.flush()?;
                self.status = Status::Halted;
                debug!(pc = self.pc, "halted");
            }
        }
        Ok(())
    }
}

impl RunFlag {
    /// Condition code describing `val` as a two's-complement word.
    pub fn of(val: u16) -> RunFlag {
        if val == 0 {
            RunFlag::Z
        } else if (val >> 15) & 1 == 1 {
            RunFlag::N
        } else {
            RunFlag::P
        }
    }
}

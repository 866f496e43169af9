/// System routines reachable with `TRAP`, selected by the low 8 bits of the instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVect {
    /// Read one character into `R0`, without echo.
    Getc = 0x20,
    /// Write the character in the low byte of `R0`.
    Out = 0x21,
    /// Write the string starting at `R0`, one character per word.
    ///
    /// Characters are bytes: only the low byte of each word is written, and the high byte is
    /// ignored. The string ends at the first word which is entirely zero.
    Puts = 0x22,
    /// Prompt, then read one character into `R0`.
    In = 0x23,
    /// Write the string starting at `R0`, two characters per word (low byte first).
    Putsp = 0x24,
    /// Stop the machine.
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVect {
    type Error = u8;
    fn try_from(vect: u8) -> Result<Self, Self::Error> {
        Ok(match vect {
            0x20 => TrapVect::Getc,
            0x21 => TrapVect::Out,
            0x22 => TrapVect::Puts,
            0x23 => TrapVect::In,
            0x24 => TrapVect::Putsp,
            0x25 => TrapVect::Halt,
            _ => return Err(vect),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vectors() {
        for vect in 0x20..=0x25u8 {
            assert_eq!(TrapVect::try_from(vect).map(|t| t as u8), Ok(vect));
        }
        assert_eq!(TrapVect::try_from(0x1F), Err(0x1F));
        assert_eq!(TrapVect::try_from(0x26), Err(0x26));
        assert_eq!(TrapVect::try_from(0xFF), Err(0xFF));
    }
}

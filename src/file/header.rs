/// The SMF format word. Format 0 files hold a single multi-channel track,
/// format 1 files hold simultaneous tracks that share the first track's
/// tempo map, and format 2 files hold independent single-track patterns.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Format {
    /// 0: the file contains a single multi-channel track
    Single = 0,
    /// 1: the file contains one or more simultaneous tracks of a sequence
    #[default]
    Multi = 1,
    /// 2: the file contains one or more sequentially independent patterns
    Sequential = 2,
}

impl Format {
    pub fn from_u16(value: u16) -> crate::Result<Self> {
        match value {
            0 => Ok(Format::Single),
            1 => Ok(Format::Multi),
            2 => Ok(Format::Sequential),
            _ => invalid_header!("format must be 0, 1 or 2, got {}", value),
        }
    }

    pub(crate) fn to_u16(self) -> u16 {
        self as u16
    }
}

const DIVISION_TYPE_BIT: u16 = 0b1000_0000_0000_0000;

/// The `<division>` header word, which specifies the meaning of delta-times.
/// When bit 15 is zero the remaining bits give the number of ticks per
/// quarter note; when bit 15 is one the word encodes an SMPTE frame rate
/// (high byte, negative, two's complement) and a per-frame resolution (low
/// byte).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Division {
    /// Ticks per quarter note.
    QuarterNote(u16),
    /// SMPTE frames per second plus ticks per frame.
    Smpte {
        frames_per_second: u8,
        ticks_per_frame: u8,
    },
}

impl Default for Division {
    fn default() -> Self {
        Division::QuarterNote(96)
    }
}

impl Division {
    pub fn from_u16(value: u16) -> Self {
        if value & DIVISION_TYPE_BIT == DIVISION_TYPE_BIT {
            let fps_twos_complement = (value >> 8) as u8;
            Division::Smpte {
                frames_per_second: (fps_twos_complement as i8).unsigned_abs(),
                ticks_per_frame: (value & 0x00ff) as u8,
            }
        } else {
            Division::QuarterNote(value)
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Division::QuarterNote(ticks) => ticks,
            Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            } => {
                let fps = (-(frames_per_second as i8)) as u8;
                ((fps as u16) << 8) | ticks_per_frame as u16
            }
        }
    }

    /// The ticks-per-quarter value used for delta-time conversion. SMPTE
    /// division reports its ticks-per-frame resolution.
    pub fn ticks_per_quarter(&self) -> u16 {
        match self {
            Division::QuarterNote(ticks) => *ticks,
            Division::Smpte { ticks_per_frame, .. } => *ticks_per_frame as u16,
        }
    }
}

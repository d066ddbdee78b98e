// channel is 0-15, displayed to users as 1-16.
clamp!(Channel, u8, 0, 15, 0, pub);

clamp!(NoteNumber, u8, 0, 127, 60, pub);
clamp!(Velocity, u8, 0, 127, 72, pub);
clamp!(Program, u8, 0, 127, 0, pub);
clamp!(U7, u8, 0, 127, 0, pub);
clamp!(ControlNumber, u8, 0, 127, 0, pub);
clamp!(ControlValue, u8, 0, 127, 0, pub);
clamp!(PressureValue, u8, 0, 127, 0, pub);
clamp!(Song, u8, 0, 127, 0, pub);
clamp!(PortValue, u8, 0, 15, 0, pub);

// 14-bit values carried as (lsb, msb) pairs on the wire. Pitch bend rests at
// its center value.
clamp!(PitchBendValue, u16, 0, 16383, 8192, pub);
clamp!(SongPosition, u16, 0, 16383, 0, pub);

impl PitchBendValue {
    /// Builds the 14-bit value from its wire representation.
    pub fn from_bytes(lsb: u8, msb: u8) -> Self {
        Self::new(((msb as u16 & 0x7f) << 7) | (lsb as u16 & 0x7f))
    }

    /// The least significant seven bits, as sent on the wire.
    pub fn lsb(&self) -> u8 {
        (self.get() & 0x7f) as u8
    }

    /// The most significant seven bits, as sent on the wire.
    pub fn msb(&self) -> u8 {
        (self.get() >> 7) as u8
    }
}

impl SongPosition {
    pub fn from_bytes(lsb: u8, msb: u8) -> Self {
        Self::new(((msb as u16 & 0x7f) << 7) | (lsb as u16 & 0x7f))
    }

    pub fn lsb(&self) -> u8 {
        (self.get() & 0x7f) as u8
    }

    pub fn msb(&self) -> u8 {
        (self.get() >> 7) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_bend_wire_round_trip() {
        let bend = PitchBendValue::from_bytes(0x21, 0x40);
        assert_eq!(8225, bend.get());
        assert_eq!(0x21, bend.lsb());
        assert_eq!(0x40, bend.msb());
        assert_eq!(8192, PitchBendValue::default().get());
    }

    #[test]
    fn channel_clamps() {
        assert_eq!(15, Channel::new(200).get());
    }
}

use crate::core::numbers::{
    Channel, ControlNumber, ControlValue, NoteNumber, PitchBendValue, PressureValue, Program, Song,
    SongPosition, Velocity, U7,
};
use crate::core::status;

/// A MIDI wire message: a channel voice message, a system common message, a
/// system real-time message, or a System Exclusive message. These are the
/// messages that travel on a live MIDI connection; meta events exist only in
/// files and live in [`crate::file::MetaEvent`].
///
/// Status bytes not present in the registry decode to [`Message::Unknown`],
/// which preserves the raw status and data so nothing is silently dropped.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Message {
    /// `8n kk vv`: stop sounding note `kk` on channel `n`.
    NoteOff {
        channel: Channel,
        note: NoteNumber,
        velocity: Velocity,
    },

    /// `9n kk vv`: start sounding note `kk` on channel `n`. A velocity of
    /// zero acts as a note off.
    NoteOn {
        channel: Channel,
        note: NoteNumber,
        velocity: Velocity,
    },

    /// `An kk ww`: change the pressure of an individual sounding note.
    PolyAftertouch {
        channel: Channel,
        note: NoteNumber,
        pressure: PressureValue,
    },

    /// `Bn cc vv`: change the value of controller `cc`. Controller numbers
    /// 120-127 select channel mode messages; this library carries them
    /// uninterpreted.
    ControlChange {
        channel: Channel,
        control: ControlNumber,
        value: ControlValue,
    },

    /// `Cn pp`: change the program (instrument) of channel `n`.
    ProgramChange { channel: Channel, program: Program },

    /// `Dn ww`: change the pressure of every sounding note on the channel.
    ChannelAftertouch {
        channel: Channel,
        pressure: PressureValue,
    },

    /// `En ll mm`: bend the pitch of the whole channel. The 14-bit value
    /// rests at 8192.
    PitchBend {
        channel: Channel,
        bend: PitchBendValue,
    },

    /// `F1 0v`: MIDI time code quarter frame.
    MtcQuarterFrame { value: U7 },

    /// `F2 ll mm`: jump to the given position, counted in MIDI beats
    /// (1 beat = 6 timing clocks) from the start of the song.
    SongPositionPointer { position: SongPosition },

    /// `F3 ss`: select which song plays on the next Start message.
    SongSelect { song: Song },

    /// `F6`: request that analog oscillators be tuned.
    TuneRequest,

    /// `F7`: end of a System Exclusive message. Emitted standalone only when
    /// an EOX arrives with no System Exclusive in progress.
    EndOfSysex,

    /// `F8`: timing clock, sent 24 times per quarter note.
    TimingClock,

    /// `FA`: start the sequence from the beginning.
    StartSequence,

    /// `FB`: continue the sequence from its current position.
    ContinueSequence,

    /// `FC`: stop the sequence.
    StopSequence,

    /// `FE`: active sensing keep-alive.
    ActiveSensing,

    /// `FF`: reset all receivers to their power-on state. On a live wire
    /// only; in a file `0xFF` introduces a meta event instead.
    SystemReset,

    /// `F0 ... F7`: System Exclusive. The body excludes both the leading
    /// `F0` and the trailing `F7`; encoders add them back.
    Sysex { data: Vec<u8> },

    /// A message whose status byte is not in the registry. The terminating
    /// status byte of the next message is *not* part of `data`.
    Unknown { status: u8, data: Vec<u8> },
}

impl Default for Message {
    fn default() -> Self {
        Message::NoteOn {
            channel: Channel::default(),
            note: NoteNumber::default(),
            velocity: Velocity::default(),
        }
    }
}

impl Message {
    /// The canonical status byte for this message kind, with channel bits
    /// zeroed. This is the dispatch key for channel messages.
    pub fn statusmsg(&self) -> u8 {
        match self {
            Message::NoteOff { .. } => status::NOTE_OFF,
            Message::NoteOn { .. } => status::NOTE_ON,
            Message::PolyAftertouch { .. } => status::POLY_AFTERTOUCH,
            Message::ControlChange { .. } => status::CONTROL_CHANGE,
            Message::ProgramChange { .. } => status::PROGRAM_CHANGE,
            Message::ChannelAftertouch { .. } => status::CHANNEL_AFTERTOUCH,
            Message::PitchBend { .. } => status::PITCH_BEND,
            Message::MtcQuarterFrame { .. } => status::MTC_QUARTER_FRAME,
            Message::SongPositionPointer { .. } => status::SONG_POSITION_POINTER,
            Message::SongSelect { .. } => status::SONG_SELECT,
            Message::TuneRequest => status::TUNE_REQUEST,
            Message::EndOfSysex => status::END_OF_SYSEX,
            Message::TimingClock => status::TIMING_CLOCK,
            Message::StartSequence => status::START_SEQUENCE,
            Message::ContinueSequence => status::CONTINUE_SEQUENCE,
            Message::StopSequence => status::STOP_SEQUENCE,
            Message::ActiveSensing => status::ACTIVE_SENSING,
            Message::SystemReset => status::SYSTEM_RESET,
            Message::Sysex { .. } => status::SYSEX_START,
            Message::Unknown { status, .. } => *status,
        }
    }

    /// The on-wire status byte: the canonical status merged with the channel
    /// bits for channel messages, the canonical status otherwise.
    pub fn status(&self) -> u8 {
        match self.channel() {
            Some(channel) => self.statusmsg() | channel.get(),
            None => self.statusmsg(),
        }
    }

    /// The channel, for channel voice messages.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Message::NoteOff { channel, .. }
            | Message::NoteOn { channel, .. }
            | Message::PolyAftertouch { channel, .. }
            | Message::ControlChange { channel, .. }
            | Message::ProgramChange { channel, .. }
            | Message::ChannelAftertouch { channel, .. }
            | Message::PitchBend { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    /// Appends this message's data bytes (everything after the status byte,
    /// in canonical order) to `out`.
    pub(crate) fn push_data_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Message::NoteOff { note, velocity, .. } | Message::NoteOn { note, velocity, .. } => {
                out.push(note.get());
                out.push(velocity.get());
            }
            Message::PolyAftertouch { note, pressure, .. } => {
                out.push(note.get());
                out.push(pressure.get());
            }
            Message::ControlChange { control, value, .. } => {
                out.push(control.get());
                out.push(value.get());
            }
            Message::ProgramChange { program, .. } => out.push(program.get()),
            Message::ChannelAftertouch { pressure, .. } => out.push(pressure.get()),
            Message::PitchBend { bend, .. } => {
                out.push(bend.lsb());
                out.push(bend.msb());
            }
            Message::MtcQuarterFrame { value } => out.push(value.get()),
            Message::SongPositionPointer { position } => {
                out.push(position.lsb());
                out.push(position.msb());
            }
            Message::SongSelect { song } => out.push(song.get()),
            Message::Sysex { data } | Message::Unknown { data, .. } => {
                out.extend_from_slice(data)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_merges_channel_bits() {
        let message = Message::NoteOn {
            channel: Channel::new(3),
            note: NoteNumber::new(60),
            velocity: Velocity::new(64),
        };
        assert_eq!(0x90, message.statusmsg());
        assert_eq!(0x93, message.status());
        assert_eq!(Some(Channel::new(3)), message.channel());
    }

    #[test]
    fn system_messages_have_no_channel() {
        assert_eq!(None, Message::TimingClock.channel());
        assert_eq!(0xf8, Message::TimingClock.status());
    }

    #[test]
    fn data_bytes_in_canonical_order() {
        let message = Message::PitchBend {
            channel: Channel::new(0),
            bend: PitchBendValue::new(8192),
        };
        let mut data = Vec::new();
        message.push_data_bytes(&mut data);
        assert_eq!(vec![0x00, 0x40], data);
    }

}

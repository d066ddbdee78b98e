use crate::core::status;
use crate::core::Message;
use crate::decoder::StreamDecoder;
use crate::event::Event;
use crate::file::MetaEvent;
use crate::registry::EventRegistry;
use crate::source::ByteSource;
use crate::vlq::{self, VlqDecoder};
use log::trace;

/// Progress through the meta grammar `FF type varlen(len) body`.
#[derive(Debug)]
enum MetaState {
    Idle,
    WantType,
    WantLength { meta_type: u8, vlq: VlqDecoder },
    Body { meta_type: u8, length: u32, data: Vec<u8> },
}

/// Progress through a length-prefixed SysEx record, `F0 varlen(n) body` or
/// the `F7` escape form.
#[derive(Debug)]
enum SysexState {
    Idle,
    WantLength { status: u8, vlq: VlqDecoder },
    Body { status: u8, length: u32, data: Vec<u8> },
}

/// The Standard-MIDI-File decoder. Wraps a [`StreamDecoder`] and adds the
/// file-only grammar: `0xFF` introduces a meta event (instead of System
/// Reset), and System Exclusive records carry an explicit varlen length
/// (instead of running to EOX). Everything else defers to the wrapped
/// live-wire decoder, so both framings of SysEx are accepted across the two
/// decoder types.
///
/// Unlike the live-wire decoder, SMF decoding can fail: an overlong varlen
/// or a meta body that disagrees with its type's fixed layout is a file
/// corruption and is fatal to the enclosing parse.
#[derive(Debug)]
pub struct SmfDecoder {
    inner: StreamDecoder,
    meta: MetaState,
    sysex: SysexState,
}

impl Default for SmfDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmfDecoder {
    /// A decoder loaded with the standard MIDI event vocabulary.
    pub fn new() -> Self {
        Self::with_registry(EventRegistry::default())
    }

    /// A decoder using a caller-supplied registry.
    pub fn with_registry(registry: EventRegistry) -> Self {
        Self {
            inner: StreamDecoder::with_registry(registry),
            meta: MetaState::Idle,
            sysex: SysexState::Idle,
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        self.inner.registry()
    }

    pub fn registry_mut(&mut self) -> &mut EventRegistry {
        self.inner.registry_mut()
    }

    /// Feed one byte, returning the next completed event, if any.
    pub fn seq_decode(&mut self, byte: u8) -> crate::Result<Option<Event>> {
        if !matches!(self.meta, MetaState::Idle) {
            return self.feed_meta(byte);
        }
        if !matches!(self.sysex, SysexState::Idle) {
            return self.feed_sysex(byte);
        }
        match byte {
            status::SYSTEM_RESET => {
                // 0xFF introduces a meta event inside a file. It also
                // terminates any unknown message still in progress.
                trace!("entering meta decode");
                self.inner.finish_unknown();
                self.meta = MetaState::WantType;
                Ok(self.inner.next_ready())
            }
            status::SYSEX_START | status::END_OF_SYSEX => {
                self.inner.finish_unknown();
                // a length-prefixed SysEx record can only begin at an event
                // boundary; mid-message these bytes belong to the wire
                // decoder (an EOX may be closing a live-form body)
                if self.inner.is_idle() {
                    trace!("entering length-prefixed sysex decode, status {:#04X}", byte);
                    self.sysex = SysexState::WantLength {
                        status: byte,
                        vlq: VlqDecoder::new(),
                    };
                    Ok(self.inner.next_ready())
                } else {
                    Ok(self.inner.seq_decode(byte))
                }
            }
            _ => Ok(self.inner.seq_decode(byte)),
        }
    }

    /// Decode a whole buffer, returning every completed event in order.
    pub fn decode(&mut self, bytes: &[u8]) -> crate::Result<Vec<Event>> {
        let mut events = Vec::new();
        for &byte in bytes {
            if let Some(event) = self.seq_decode(byte)? {
                events.push(event);
            }
            while let Some(event) = self.inner.next_ready() {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Reads one variable-length quantity from a byte source, consuming one
    /// byte at a time. Returns the value and the number of bytes consumed.
    pub fn read_varlen<S: ByteSource>(&mut self, source: &mut S) -> crate::Result<(u32, usize)> {
        Ok(vlq::read_varlen_inner(source)?)
    }

    /// Drops every in-progress decode, including the wrapped live-wire
    /// decoder's stack and running status.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.meta = MetaState::Idle;
        self.sysex = SysexState::Idle;
    }

    fn feed_meta(&mut self, byte: u8) -> crate::Result<Option<Event>> {
        match std::mem::replace(&mut self.meta, MetaState::Idle) {
            MetaState::Idle => Ok(None),
            MetaState::WantType => {
                self.meta = MetaState::WantLength {
                    meta_type: byte,
                    vlq: VlqDecoder::new(),
                };
                Ok(None)
            }
            MetaState::WantLength { meta_type, mut vlq } => match vlq.push(byte) {
                Ok(Some((length, _))) => {
                    if length == 0 {
                        return self.finish_meta(meta_type, Vec::new()).map(Some);
                    }
                    self.meta = MetaState::Body {
                        meta_type,
                        length,
                        data: Vec::with_capacity(length as usize),
                    };
                    Ok(None)
                }
                Ok(None) => {
                    self.meta = MetaState::WantLength { meta_type, vlq };
                    Ok(None)
                }
                Err(_) => Err(crate::error::OverlongVarlenSnafu { site: site!() }.build().into()),
            },
            MetaState::Body {
                meta_type,
                length,
                mut data,
            } => {
                data.push(byte);
                if data.len() as u32 == length {
                    return self.finish_meta(meta_type, data).map(Some);
                }
                self.meta = MetaState::Body {
                    meta_type,
                    length,
                    data,
                };
                Ok(None)
            }
        }
    }

    fn finish_meta(&mut self, meta_type: u8, data: Vec<u8>) -> crate::Result<Event> {
        let meta = match self.registry().meta(meta_type) {
            Some(spec) => (spec.build)(meta_type, &data)?,
            None => {
                trace!("unregistered meta type {:#04X}", meta_type);
                MetaEvent::Unknown { meta_type, data }
            }
        };
        trace!("decoded {:?}", meta);
        Ok(Event::meta(meta))
    }

    fn feed_sysex(&mut self, byte: u8) -> crate::Result<Option<Event>> {
        match std::mem::replace(&mut self.sysex, SysexState::Idle) {
            SysexState::Idle => Ok(None),
            SysexState::WantLength { status, mut vlq } => match vlq.push(byte) {
                Ok(Some((length, _))) => {
                    if length == 0 {
                        return Ok(Some(Self::finish_sysex(status, Vec::new())));
                    }
                    self.sysex = SysexState::Body {
                        status,
                        length,
                        data: Vec::with_capacity(length as usize),
                    };
                    Ok(None)
                }
                Ok(None) => {
                    self.sysex = SysexState::WantLength { status, vlq };
                    Ok(None)
                }
                Err(_) => Err(crate::error::OverlongVarlenSnafu { site: site!() }.build().into()),
            },
            SysexState::Body {
                status,
                length,
                mut data,
            } => {
                data.push(byte);
                if data.len() as u32 == length {
                    return Ok(Some(Self::finish_sysex(status, data)));
                }
                self.sysex = SysexState::Body {
                    status,
                    length,
                    data,
                };
                Ok(None)
            }
        }
    }

    fn finish_sysex(status_byte: u8, mut data: Vec<u8>) -> Event {
        // in the F0 form the declared length includes the trailing EOX,
        // which is not part of the in-memory body
        if status_byte == status::SYSEX_START && data.last() == Some(&status::END_OF_SYSEX) {
            data.pop();
        }
        trace!("decoded sysex, {} byte(s)", data.len());
        Event::message(Message::Sysex { data })
    }
}

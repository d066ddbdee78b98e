use crate::core::status;
use crate::core::Message;
use crate::event::Event;
use crate::registry::EventRegistry;
use log::{trace, warn};
use std::collections::VecDeque;

/// One in-progress message. Running status is represented implicitly: a
/// data byte arriving with an empty stack re-opens a frame under the last
/// remembered status.
#[derive(Debug)]
struct Frame {
    status: u8,
    /// Expected data byte count, -1 for open-ended.
    length: i8,
    /// The status byte that terminates an open-ended message.
    end: Option<u8>,
    /// False when the status byte has no registry entry; such frames run
    /// until the next status byte arrives.
    known: bool,
    data: Vec<u8>,
}

/// The incremental live-wire decoder. Bytes go in one at a time through
/// [`StreamDecoder::seq_decode`] (or in bulk through
/// [`StreamDecoder::decode`]); typed events come out as soon as they
/// complete.
///
/// The decoder never fails: unknown status bytes become
/// [`Message::Unknown`] events, and a data byte with no applicable running
/// status is skipped with a diagnostic on the log.
#[derive(Debug)]
pub struct StreamDecoder {
    registry: EventRegistry,
    stack: Vec<Frame>,
    running_status: Option<u8>,
    ready: VecDeque<Event>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    /// A decoder loaded with the standard MIDI event vocabulary.
    pub fn new() -> Self {
        Self::with_registry(EventRegistry::default())
    }

    /// A decoder using a caller-supplied registry.
    pub fn with_registry(registry: EventRegistry) -> Self {
        Self {
            registry,
            stack: Vec::new(),
            running_status: None,
            ready: VecDeque::new(),
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EventRegistry {
        &mut self.registry
    }

    /// Feed one byte. Returns the next completed event, if any. When a
    /// single byte completes more than one message (an unknown message
    /// terminated by a zero-length status), the surplus is returned by
    /// subsequent calls or by [`StreamDecoder::next_ready`].
    pub fn seq_decode(&mut self, byte: u8) -> Option<Event> {
        self.accept(byte);
        self.ready.pop_front()
    }

    /// Decode a whole buffer, returning every completed event in order.
    /// Messages still in progress at the end of the buffer remain on the
    /// stack and can be continued by further calls.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in bytes {
            self.accept(byte);
            while let Some(event) = self.ready.pop_front() {
                events.push(event);
            }
        }
        events
    }

    /// Pops a completed event without feeding a byte.
    pub fn next_ready(&mut self) -> Option<Event> {
        self.ready.pop_front()
    }

    /// True when no message is in progress, i.e. the next byte starts (or
    /// continues, under running status) a fresh message.
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    /// Completes any unknown messages sitting on top of the stack, as a
    /// status byte would, without consuming a byte. The SMF layer uses this
    /// when a byte it intercepts (meta or length-prefixed SysEx) doubles as
    /// the terminator of an unknown message.
    pub(crate) fn finish_unknown(&mut self) {
        loop {
            let tops_unknown = matches!(self.stack.last(), Some(top) if !top.known);
            if !tops_unknown {
                break;
            }
            self.finish_top();
        }
    }

    /// Drops all in-progress frames, running status, and queued events.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.running_status = None;
        self.ready.clear();
    }

    fn accept(&mut self, byte: u8) {
        if status::is_realtime(byte) {
            // Real-Time messages interrupt anything, are delivered
            // immediately, and leave the stack and running status alone.
            self.emit_wire(byte, Vec::new());
            return;
        }
        if status::is_status(byte) {
            self.status_byte(byte);
        } else {
            self.data_byte(byte);
        }
    }

    fn status_byte(&mut self, byte: u8) {
        loop {
            let (is_terminator, tops_unknown) = match self.stack.last() {
                Some(top) => (top.end == Some(byte), !top.known),
                None => (false, false),
            };
            if is_terminator {
                // the terminator of an open-ended message is consumed by it
                self.finish_top();
                return;
            }
            if tops_unknown {
                // a status byte ends an unknown message without being
                // consumed; reconsider it against whatever is beneath
                self.finish_top();
                continue;
            }
            break;
        }
        if status::is_channel_status(byte) {
            self.running_status = Some(byte);
        } else if byte != status::SYSEX_START {
            // system common cancels running status; SysEx does not
            self.running_status = None;
        }
        self.push_frame(byte);
    }

    fn data_byte(&mut self, byte: u8) {
        if self.stack.is_empty() {
            match self.running_status {
                Some(running) => {
                    trace!("running status {:#04X}", running);
                    self.push_frame(running);
                }
                None => {
                    warn!("data byte {:#04X} with no running status, skipped", byte);
                    return;
                }
            }
        }
        if let Some(top) = self.stack.last_mut() {
            top.data.push(byte);
        }
        self.try_complete();
    }

    fn push_frame(&mut self, status_byte: u8) {
        let frame = match self.registry.wire(status_byte) {
            Some(spec) => Frame {
                status: status_byte,
                length: spec.length,
                end: spec.end,
                known: true,
                data: Vec::new(),
            },
            None => {
                trace!("unregistered status {:#04X}", status_byte);
                Frame {
                    status: status_byte,
                    length: -1,
                    end: None,
                    known: false,
                    data: Vec::new(),
                }
            }
        };
        self.stack.push(frame);
        self.try_complete();
    }

    fn try_complete(&mut self) {
        let done = match self.stack.last() {
            Some(top) => top.known && top.length >= 0 && top.data.len() == top.length as usize,
            None => false,
        };
        if done {
            self.finish_top();
        }
    }

    fn finish_top(&mut self) {
        if let Some(frame) = self.stack.pop() {
            if frame.known {
                self.emit_wire(frame.status, frame.data);
            } else {
                self.emit(Message::Unknown {
                    status: frame.status,
                    data: frame.data,
                });
            }
        }
    }

    fn emit_wire(&mut self, status_byte: u8, data: Vec<u8>) {
        let message = match self.registry.wire(status_byte) {
            Some(spec) => (spec.build)(status_byte, &data),
            None => Message::Unknown {
                status: status_byte,
                data,
            },
        };
        self.emit(message);
    }

    fn emit(&mut self, message: Message) {
        trace!("decoded {:?}", message);
        self.ready.push_back(Event::message(message));
    }
}

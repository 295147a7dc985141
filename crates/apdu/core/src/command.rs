//! APDU command definitions
//!
//! This module provides the command type used throughout the crate and the
//! ISO/IEC 7816-4 command chaining that splits a long data field into
//! several frames.

use std::iter::FusedIterator;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Largest data field a short APDU can carry
pub const MAX_SHORT_DATA: usize = 255;

/// Instruction byte of GET RESPONSE
pub const INS_GET_RESPONSE: u8 = 0xC0;

/// Generic APDU command structure
///
/// The expected length uses `0` for "no Le field": a zero Le is never
/// encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data, empty when the command has no data field
    pub data: Bytes,
    /// Expected response length, `0` when absent
    pub le: u8,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: 0,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Create a new command with both data and expected length
    pub fn new_with_data_and_le<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
        le: u8,
    ) -> Self {
        Self::new_with_le(cla, ins, p1, p2, le).with_data(data)
    }

    /// The GET RESPONSE command used to pull pending response bytes
    pub const fn get_response(le: u8) -> Self {
        Self::new_with_le(0x00, INS_GET_RESPONSE, 0x00, 0x00, le)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = data.into();
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = le;
        self
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command payload data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Expected response length, `0` when absent
    pub const fn expected_length(&self) -> u8 {
        self.le
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        // Header (CLA, INS, P1, P2) is always 4 bytes
        let mut length = 4;

        if !self.data.is_empty() {
            length += 1 + self.data.len();
        }

        if self.le != 0 {
            length += 1;
        }

        length
    }

    /// Convert to raw APDU bytes: `CLA INS P1 P2 [Lc Data] [Le]`
    ///
    /// Fails when the data field does not fit a one-byte Lc; such commands
    /// must be sent through [`Command::chained`].
    pub fn to_bytes(&self) -> Result<Bytes> {
        if self.data.len() > MAX_SHORT_DATA {
            return Err(Error::InvalidCommandLength(self.data.len()));
        }

        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if !self.data.is_empty() {
            buffer.put_u8(self.data.len() as u8);
            buffer.put_slice(&self.data);
        }

        if self.le != 0 {
            buffer.put_u8(self.le);
        }

        Ok(buffer.freeze())
    }

    /// Whether the data field is longer than `max_payload`
    pub fn needs_chaining(&self, max_payload: usize) -> bool {
        self.data.len() > max_payload
    }

    /// Split this command into chained sub-commands.
    ///
    /// The data is cut into chunks of at most `max_payload` bytes. Every
    /// sub-command but the last has `chaining_bit` OR-ed into its class byte
    /// and no Le; the last one keeps the original class byte and Le. A
    /// command that does not need chaining yields itself once. The original
    /// command is left untouched and the returned iterator can be cloned to
    /// restart the sequence. A `max_payload` of zero is treated as one.
    pub fn chained(&self, max_payload: usize, chaining_bit: u8) -> ChainedCommands<'_> {
        ChainedCommands {
            command: self,
            max_payload: max_payload.max(1),
            chaining_bit,
            offset: 0,
            done: false,
        }
    }

    /// Parse a command from raw bytes
    ///
    /// A trailing Le of `00` is read back as "no Le".
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::InvalidCommandLength(data.len()));
        }

        let mut command = Self::new(data[0], data[1], data[2], data[3]);

        if data.len() == 5 {
            // Only Le present, no data
            command.le = data[4];
        } else if data.len() > 5 {
            let lc = data[4] as usize;

            if lc == 0 || data.len() < 5 + lc {
                return Err(Error::InvalidCommandLength(data.len()));
            }
            command.data = Bytes::copy_from_slice(&data[5..5 + lc]);

            match data.len() - (5 + lc) {
                0 => {}
                1 => command.le = data[5 + lc],
                _ => return Err(Error::InvalidCommandLength(data.len())),
            }
        }

        Ok(command)
    }
}

/// Lazy sequence of chained sub-commands, see [`Command::chained`]
#[derive(Debug, Clone)]
pub struct ChainedCommands<'a> {
    command: &'a Command,
    max_payload: usize,
    chaining_bit: u8,
    offset: usize,
    done: bool,
}

impl Iterator for ChainedCommands<'_> {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let data = &self.command.data;
        let end = (self.offset + self.max_payload).min(data.len());
        let last = end == data.len();

        let sub_command = if last {
            Command {
                data: data.slice(self.offset..end),
                ..self.command.clone()
            }
        } else {
            Command {
                cla: self.command.cla | self.chaining_bit,
                ins: self.command.ins,
                p1: self.command.p1,
                p2: self.command.p2,
                data: data.slice(self.offset..end),
                le: 0,
            }
        };

        self.offset = end;
        self.done = last;
        Some(sub_command)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            let left = self.command.data.len() - self.offset;
            left.div_ceil(self.max_payload).max(1)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChainedCommands<'_> {}

impl FusedIterator for ChainedCommands<'_> {}

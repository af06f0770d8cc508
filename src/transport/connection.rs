//! Per-peer connection with buffered I/O
//!
//! Lives entirely on the I/O thread. The read side validates the peer's
//! greeting and reassembles frames into messages; the write side queues
//! encoded frames and flushes as far as the socket allows.

use std::io::{self, Read, Write};
use std::mem;
use std::net::SocketAddr;

use mio::net::TcpStream;

use super::{SocketKind, Variant};
use crate::error::{DomoError, Result};
use crate::protocol::frame::{self, FrameDecoder, GREETING_SIZE};

/// Read granularity per syscall
const READ_CHUNK_SIZE: usize = 64 * 1024;

pub(crate) struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    local_kind: SocketKind,
    peer_kind: Option<SocketKind>,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    // Frames of a message whose last frame has not arrived yet
    partial: Vec<Vec<u8>>,
}

impl Connection {
    /// Wrap a connected stream and queue our greeting
    pub fn new(stream: TcpStream, addr: SocketAddr, local_kind: SocketKind) -> io::Result<Self> {
        stream.set_nodelay(true)?;

        let mut write_buffer = Vec::with_capacity(READ_CHUNK_SIZE);
        write_buffer.extend_from_slice(&frame::encode_greeting(local_kind as u8));

        Ok(Self {
            stream,
            addr,
            local_kind,
            peer_kind: None,
            read_buffer: Vec::with_capacity(READ_CHUNK_SIZE),
            write_buffer,
            partial: Vec::new(),
        })
    }

    /// Drain the socket into the read buffer
    ///
    /// Returns `false` once the peer has closed its side.
    pub fn fill_read_buffer(&mut self) -> io::Result<bool> {
        loop {
            let len = self.read_buffer.len();
            self.read_buffer.resize(len + READ_CHUNK_SIZE, 0);

            let result = self.stream.read(&mut self.read_buffer[len..]);
            let read = match &result {
                Ok(n) => *n,
                Err(_) => 0,
            };
            self.read_buffer.truncate(len + read);

            match result {
                Ok(0) => return Ok(false),
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Pull every complete message out of the read buffer
    pub fn take_messages(&mut self) -> Result<Vec<Vec<Vec<u8>>>> {
        let mut messages = Vec::new();
        let mut consumed = 0;

        if self.peer_kind.is_none() {
            if self.read_buffer.len() < GREETING_SIZE {
                return Ok(messages);
            }
            let code = frame::parse_greeting(&self.read_buffer)?;
            let kind = SocketKind::from_u8(code)
                .ok_or_else(|| DomoError::protocol(format!("unknown peer socket kind {}", code)))?;
            if kind != self.local_kind.peer_kind() {
                return Err(DomoError::protocol(format!(
                    "{} cannot talk to {}",
                    self.local_kind, kind
                )));
            }
            self.peer_kind = Some(kind);
            consumed = GREETING_SIZE;
        }

        let single_frame = self.local_kind.variant() == Variant::SingleFrame;
        let mut decoder = FrameDecoder::new(&self.read_buffer[consumed..]);
        while let Some((more, data)) = decoder.next_frame()? {
            if more && single_frame {
                return Err(DomoError::protocol("multi-frame message on a single-frame socket"));
            }
            self.partial.push(data.to_vec());
            if !more {
                messages.push(mem::take(&mut self.partial));
            }
        }
        consumed += decoder.consumed();

        self.read_buffer.drain(..consumed);
        Ok(messages)
    }

    /// Queue one message for writing
    #[inline]
    pub fn queue_message(&mut self, frames: &[Vec<u8>]) {
        frame::encode_message(&mut self.write_buffer, frames);
    }

    /// Write as much of the pending buffer as the socket accepts
    pub fn flush_write_buffer(&mut self) -> io::Result<()> {
        let mut written = 0;
        while written < self.write_buffer.len() {
            match self.stream.write(&self.write_buffer[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write to socket",
                    ));
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.write_buffer.drain(..written);
        Ok(())
    }

    /// Bytes still waiting for the socket
    #[inline(always)]
    pub fn write_pending(&self) -> usize {
        self.write_buffer.len()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

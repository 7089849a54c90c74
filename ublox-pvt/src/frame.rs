/// First UBX sync character
pub const SYNC_CHAR_1: u8 = 0xB5;
/// Second UBX sync character
pub const SYNC_CHAR_2: u8 = 0x62;
/// Sync, class, id, length and checksum bytes surrounding every payload
pub const FRAME_OVERHEAD: usize = 8;

const HEADER_LEN: usize = 6;

/// UBX 8-bit Fletcher checksum over `class, id, len_lo, len_hi, payload...`.
pub fn ubx_checksum(data: &[u8]) -> (u8, u8) {
    data.iter().fold((0u8, 0u8), |(ck_a, ck_b), &b| {
        let ck_a = ck_a.wrapping_add(b);
        (ck_a, ck_b.wrapping_add(ck_a))
    })
}

/// Wrap a payload into a complete UBX frame.
///
/// Payloads longer than `u16::MAX` cannot be described by the length field;
/// callers only ever pass fixed-size configuration payloads.
pub fn encode_frame(msg_class: u8, msg_id: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u16::MAX as usize);
    let mut out = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    out.extend_from_slice(&[SYNC_CHAR_1, SYNC_CHAR_2, msg_class, msg_id]);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    let (ck_a, ck_b) = ubx_checksum(&out[2..]);
    out.push(ck_a);
    out.push(ck_b);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A checksum-validated UBX frame, stripped of sync, length and checksum.
pub struct RawFrame {
    /// Message class
    pub msg_class: u8,
    /// Message id within the class
    pub msg_id: u8,
    /// Payload, exactly as long as the header announced
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Re-encode the frame into its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_frame(self.msg_class, self.msg_id, &self.payload)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Running counters kept by a [`FrameAssembler`]
pub struct AssemblerStats {
    /// Frames that passed the checksum and were yielded
    pub frames: u64,
    /// Candidate frames dropped for a checksum mismatch
    pub checksum_failures: u64,
    /// Bytes dropped while searching for a sync marker
    pub noise_bytes: u64,
}

#[derive(Debug, Default)]
/// Reassembles UBX frames from an arbitrarily chunked byte stream.
///
/// Bytes are appended with [`feed`](Self::feed) and consumed from the front
/// as frames are found. When a chunk holds no sync marker at all the buffer
/// is dropped, except for a trailing first sync character which may be
/// completed by the next chunk. Candidates with a bad checksum are dropped
/// silently and scanning resumes after them.
pub struct FrameAssembler {
    buf: Vec<u8>,
    max_payload_len: Option<u16>,
    stats: AssemblerStats,
}

impl FrameAssembler {
    /// Create an assembler that waits for however many bytes a header announces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler that treats headers announcing more than
    /// `max_payload_len` payload bytes as noise and resynchronizes past them.
    pub fn with_max_payload(max_payload_len: u16) -> Self {
        Self {
            max_payload_len: Some(max_payload_len),
            ..Default::default()
        }
    }

    /// Append `bytes` and iterate over every frame that can now be completed.
    ///
    /// Frames are consumed lazily; bytes left over when the iterator is
    /// exhausted (or dropped) stay buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(bytes);
        Frames { assembler: self }
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Counters accumulated since creation
    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    fn discard(&mut self, count: usize) {
        self.buf.drain(..count);
        self.stats.noise_bytes += count as u64;
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            match self
                .buf
                .windows(2)
                .position(|w| w == [SYNC_CHAR_1, SYNC_CHAR_2])
            {
                None => {
                    let keep = self.buf.last() == Some(&SYNC_CHAR_1);
                    self.discard(self.buf.len() - keep as usize);
                    return None;
                }
                Some(0) => {}
                Some(pos) => self.discard(pos),
            }
            if self.buf.len() < FRAME_OVERHEAD {
                return None;
            }
            let msg_class = self.buf[2];
            let msg_id = self.buf[3];
            let len = u16::from_le_bytes([self.buf[4], self.buf[5]]);
            if let Some(max) = self.max_payload_len {
                if len > max {
                    log::trace!("UBX {msg_class:#04x}/{msg_id:#04x} claims {len} bytes, resyncing");
                    self.discard(2);
                    continue;
                }
            }
            let total_len = FRAME_OVERHEAD + len as usize;
            if self.buf.len() < total_len {
                return None;
            }
            let candidate: Vec<u8> = self.buf.drain(..total_len).collect();
            let (ck_a, ck_b) = ubx_checksum(&candidate[2..total_len - 2]);
            if ck_a != candidate[total_len - 2] || ck_b != candidate[total_len - 1] {
                self.stats.checksum_failures += 1;
                continue;
            }
            self.stats.frames += 1;
            return Some(RawFrame {
                msg_class,
                msg_id,
                payload: candidate[HEADER_LEN..total_len - 2].to_vec(),
            });
        }
    }
}

/// Lazy iterator over the frames completed by a [`FrameAssembler::feed`] call
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Frames<'_> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        self.assembler.next_frame()
    }
}

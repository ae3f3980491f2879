use std::{cmp::{max, min}, fmt};

use crate::pdu_parse_error::PduParseErr;

/// Bit-granular cursor over a byte vector. Frame fields on the cable MAC are byte aligned
/// almost everywhere, but the frame-control byte, extended header TLVs and MAP information
/// elements pack sub-byte fields, so all reads and writes go through bit offsets.
#[derive(Clone)]
pub struct BitBuffer {
    buffer: Vec<u8>,
    start: usize,       // bits before this are out of window
    pos: usize,         // next bit offset for read/write (absolute)
    end: usize,         // bits at or after this are out of window
    flag_autoexpand: bool,   // if true, ignores end pointer on writes and reallocates buffer if insufficient capacity
}

impl BitBuffer {
    /// Create a zeroed buffer capable of holding exactly `len_bits` bits.
    pub fn new(len_bits: usize) -> Self {
        let byte_len = len_bits.div_ceil(8);
        BitBuffer {
            buffer: vec![0; byte_len],
            start: 0,
            pos: 0,
            end: len_bits,
            flag_autoexpand: false,
        }
    }

    /// Create a zeroed buffer with an inital capacity but zero length (end is set to 0).
    /// Writes to this buffer will automatically advance the end pointer and reallocate the buffer if needed
    pub fn new_autoexpand(initial_max_len_bits: usize) -> Self {
        let byte_len = initial_max_len_bits.div_ceil(8);
        BitBuffer {
            buffer: vec![0; byte_len],
            start: 0,
            pos: 0,
            end: 0,
            flag_autoexpand: true,
        }
    }

    /// Wrap an existing byte-vector as a BitBuffer (all bits initially readable/writeable).
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len_bits = data.len() * 8;
        BitBuffer {
            buffer: data,
            start: 0,
            pos: 0,
            end: len_bits,
            flag_autoexpand: false,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Construct a BitBuffer from a string of '0'/'1' characters.
    /// Any other character yields InvalidValue carrying its index.
    pub fn from_bitstr(bitstr: &str) -> Result<Self, PduParseErr> {
        let mut buf = BitBuffer::new(bitstr.chars().count());
        for (i, c) in bitstr.chars().enumerate() {
            match c {
                '0' => buf.write_bits(0, 1),
                '1' => buf.write_bits(1, 1),
                _ => return Err(PduParseErr::InvalidValue { field: "bitstring", value: i as u64 }),
            }
        }
        buf.pos = buf.start;
        Ok(buf)
    }

    /// Read `num_bits` at the current pos, advancing on success.
    pub fn read_bits(&mut self, num_bits: usize) -> Option<u64> {
        if num_bits > 64 || self.pos + num_bits > self.end {
            return None;
        }
        let v = self.read_bits_at_unchecked(self.pos, num_bits);
        self.pos += num_bits;
        Some(v)
    }

    /// Similar to read_bits, but returns a ParseError::BufferEnded with the given error_string if not enough bits are available.
    pub fn read_field(&mut self, num_bits: usize, error_string: &'static str) -> Result<u64, PduParseErr> {
        self.read_bits(num_bits).ok_or(PduParseErr::BufferEnded { field: Some(error_string) })
    }

    /// Read `num_bytes` whole bytes from pos. Pos does not need to be byte aligned.
    pub fn read_bytes(&mut self, num_bytes: usize, error_string: &'static str) -> Result<Vec<u8>, PduParseErr> {
        if self.get_len_remaining() < num_bytes * 8 {
            return Err(PduParseErr::BufferEnded { field: Some(error_string) });
        }
        let mut out = Vec::with_capacity(num_bytes);
        for _ in 0..num_bytes {
            out.push(self.read_bits_at_unchecked(self.pos, 8) as u8);
            self.pos += 8;
        }
        Ok(out)
    }

    fn _realloc_tail(&mut self, new_cap_bits: usize) {
        let new_cap_bytes = new_cap_bits.div_ceil(8);
        assert!(new_cap_bytes >= self.buffer.len(), "new capacity must be larger than current buffer size");
        self.buffer.resize(new_cap_bytes, 0);
    }

    /// When a write would exceed the end, but the BitBuffer is set to automatically expand,
    /// this function is called to increase `end` and if needed, allocate more space in the buffer.
    fn _move_end(&mut self, needed_extra_bits: usize) {
        let free_cap_bits = self.buffer.len() * 8 - self.end;
        let needed_total_bits = self.end + needed_extra_bits;

        if needed_extra_bits > free_cap_bits {
            let double_cap_bits = self.buffer.len() * 8 * 2;
            let new_cap_bits = max(needed_total_bits, double_cap_bits);
            self._realloc_tail(new_cap_bits);
        }

        self.end += needed_extra_bits;
    }

    /// Write an arbitrary amount of zero-bits
    pub fn write_zeroes(&mut self, num_bits: usize) {
        let mut bits_remaining = num_bits;
        while bits_remaining > 0 {
            let chunk_size = min(bits_remaining, 64);
            self.write_bits(0, chunk_size);
            bits_remaining -= chunk_size;
        }
    }

    /// Write up to 64 bits, advancing pos.
    /// If autoexpand is enabled, will advance end as well and/or realloc if buffer full
    /// If disabled, panics if exceeds end.
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        assert!(num_bits <= 64, "can only write up to 64 bits");
        assert!(num_bits == 64 || value >> num_bits == 0, "value exceeds num_bits {} {}", value, num_bits);

        if self.pos + num_bits > self.end {
            if self.flag_autoexpand {
                // Only grow by the part that sticks out past end
                let overshoot = self.pos + num_bits - self.end;
                self._move_end(overshoot);
            } else {
                panic!("write would exceed buffer end");
            }
        }

        let mut remaining = num_bits;
        let mut cur = self.pos;

        // 1) head bits
        let head_offset = cur % 8;
        if head_offset != 0 && remaining > 0 {
            let h = usize::min(remaining, 8 - head_offset);
            let idx = cur / 8;
            let bits_to_write = ((value >> (remaining - h)) as u8) & ((1u16 << h) - 1) as u8;
            let shift = 8 - (head_offset + h);
            let mask = (((1u16 << h) - 1) << shift) as u8;
            self.buffer[idx] = (self.buffer[idx] & !mask) | (bits_to_write << shift);
            cur += h;
            remaining -= h;
        }

        // 2) full bytes
        while remaining >= 8 {
            let idx = cur / 8;
            self.buffer[idx] = ((value >> (remaining - 8)) & 0xFF) as u8;
            cur += 8;
            remaining -= 8;
        }

        // 3) tail bits
        if remaining > 0 {
            let idx = cur / 8;
            let bits_to_write = (value as u8) & ((1u16 << remaining) - 1) as u8;
            let shift = 8 - (cur % 8 + remaining);
            let mask = (((1u16 << remaining) - 1) << shift) as u8;
            self.buffer[idx] = (self.buffer[idx] & !mask) | (bits_to_write << shift);
        }

        self.pos += num_bits;
    }

    /// Append whole bytes at pos
    pub fn write_bytes(&mut self, data: &[u8]) {
        for b in data {
            self.write_bits(*b as u64, 8);
        }
    }

    /// Copy of the bytes between pos and end. Trailing bits that do not fill a byte are dropped.
    pub fn remaining_bytes(&self) -> Vec<u8> {
        let num_bytes = self.get_len_remaining() / 8;
        (0..num_bytes)
            .map(|i| self.read_bits_at_unchecked(self.pos + i * 8, 8) as u8)
            .collect()
    }

    /// Extract the window contents as bytes. The window must start on a byte boundary.
    pub fn into_bytes(mut self) -> Vec<u8> {
        assert!(self.start % 8 == 0, "into_bytes: window not byte aligned");
        let first = self.start / 8;
        let last = self.end.div_ceil(8);
        self.buffer.truncate(last);
        self.buffer.drain(..first);
        self.buffer
    }

    /// Number of bits left in the window (bits), from pos to end.
    pub fn get_len_remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Get the current position, relative to window
    pub fn get_pos(&self) -> usize {
        self.pos - self.start
    }

    /// Seek `pos` to `offset` (relative to window start).
    pub fn seek(&mut self, offset: usize) {
        let abs = self.start + offset;
        assert!(abs <= self.end, "seek out of window: got {}, allowed [{},{}]", abs, self.start, self.end);
        self.pos = abs;
    }

    /// Move the current bit-pointer by `offset` bits (can be negative).
    /// Panics if the resulting position would lie outside the window `[start..=end]`.
    pub fn seek_rel(&mut self, offset: isize) {
        let new_pos = (self.pos as isize + offset) as usize;
        assert!(
            new_pos >= self.start && new_pos <= self.end,
            "seek out of window: got {}, allowed [{},{}]",
            new_pos, self.start, self.end);
        self.pos = new_pos;
    }

    /// Dump the [start..end) window as a hex string (uppercase, no separators).
    /// If the window length isn't a multiple of 4, the last nibble is padded with zeros.
    pub fn dump_hex(&self) -> String {
        let len = self.end - self.start;
        let n_nibbles = len.div_ceil(4);
        let mut s = String::with_capacity(n_nibbles);
        for i in 0..n_nibbles {
            let bit_pos = self.start + i * 4;
            let bits_left = len - i * 4;
            let take = usize::min(4, bits_left);
            let v = self.read_bits_at_unchecked(bit_pos, take) as u8;
            let digit = if take < 4 { v << (4 - take) } else { v };
            s.push_str(&format!("{:X}", digit));
        }
        s
    }

    /// Reads exactly `num_bits` bits starting at absolute `bit_pos`,
    /// returning them as the low `num_bits` of a `u64`, regardless of window.
    /// Caller must ensure `num_bits <= 64` and `bit_pos + num_bits <= end`.
    fn read_bits_at_unchecked(&self, mut bit_pos: usize, num_bits: usize) -> u64 {
        let mut result = 0u64;
        let mut bits_remaining = num_bits;

        // 1) head bits to align to next byte
        let head = bit_pos % 8;
        if head != 0 && bits_remaining > 0 {
            let take = usize::min(8 - head, bits_remaining);
            let byte = self.buffer[bit_pos / 8];
            let shift = 8 - head - take;
            let mask = ((1u16 << take) - 1) as u8;
            result = ((byte >> shift) & mask) as u64;
            bit_pos += take;
            bits_remaining -= take;
        }

        // 2) full bytes
        while bits_remaining >= 8 {
            result = (result << 8) | self.buffer[bit_pos / 8] as u64;
            bit_pos += 8;
            bits_remaining -= 8;
        }

        // 3) tail bits
        if bits_remaining > 0 {
            let byte = self.buffer[bit_pos / 8];
            let shift = 8 - bits_remaining;
            result = (result << bits_remaining) | (byte >> shift) as u64;
        }

        result
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuffer {{ <{} ^{} >{} {} }}", self.start, self.pos, self.end, self.dump_hex())
    }
}

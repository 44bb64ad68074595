//! The forward pass that drives the adapter over the whole compressed
//! stream and captures access points at selected block boundaries.
//!
//! Grounded in zlib's `zran.c` example (`zran_build_index`) and
//! `GzipZInfoDecompressor::read`, generalized from a fixed 32 KiB window to
//! the index's configured `window_size`.

use std::io::Read;

use crate::adapter::{Adapter, Status};
use crate::error::{Error, Result};
use crate::point::{AccessPoint, RingBuffer};
use crate::store::Index;

impl Index {
    /// Makes one entire pass through `source`, building access points about
    /// every `spacing` bytes of uncompressed output. Data after the end of
    /// the first zlib/gzip stream is ignored (see design notes).
    ///
    /// Returns the number of access points on success (always `>= 1`).
    pub fn build<R: Read>(&mut self, source: &mut R) -> Result<usize> {
        let window_size = self.window_size as usize;
        let readbuf_size = self.readbuf_size as usize;

        // The sliding output buffer the adapter writes into. Only reset to
        // full capacity when exhausted (`avail_out == 0`), so that a single
        // `window_size` pass through it can span many `inflate` calls,
        // mirroring zran.c's `if (strm.avail_out == 0) { ... }` rather than
        // handing the adapter a fresh buffer every call.
        let mut window_buf = vec![0u8; window_size];
        let mut window = RingBuffer::new(window_size);
        let mut input = vec![0u8; readbuf_size];

        let mut adapter = Adapter::new_auto()?;
        adapter.set_output(&mut []); // avail_out starts at 0, forcing the first reset below

        let mut totin: u64 = 0;
        let mut totout: u64 = 0;
        let mut last: u64 = 0;

        'outer: loop {
            let n = source.read(&mut input)?;
            if n == 0 {
                return Err(Error::DataError("input exhausted before end of stream"));
            }
            adapter.set_input(&input[..n]);

            loop {
                if adapter.avail_out() == 0 {
                    adapter.set_output(&mut window_buf);
                }
                let out_before = adapter.avail_out() as u64;
                let written_so_far = window_size as u64 - out_before;

                let before_in = adapter.avail_in() as u64;
                let status = adapter.inflate_block()?;
                let consumed_in = before_in - adapter.avail_in() as u64;
                let out_after = adapter.avail_out() as u64;
                let produced_out = out_before - out_after;

                totin += consumed_in;
                totout += produced_out;

                window.write(
                    &window_buf[written_so_far as usize..(written_so_far + produced_out) as usize],
                );

                match status {
                    Status::EndOfStream => break 'outer,
                    Status::EndOfBlock => {
                        let ended_last_block = adapter.is_last_block();
                        if !ended_last_block && (totout == 0 || totout - last > self.spacing as u64)
                        {
                            let point = AccessPoint {
                                cmp_offset: totin,
                                bits: adapter.bit_remainder(),
                                uncmp_offset: totout,
                                window: window.to_linear(),
                            };
                            log::debug!(
                                "access point #{}: cmp_offset={} uncmp_offset={} bits={}",
                                self.points.len(),
                                point.cmp_offset,
                                point.uncmp_offset,
                                point.bits
                            );
                            self.append(point);
                            last = totout;
                        }
                        if adapter.avail_in() == 0 {
                            break;
                        }
                    }
                    Status::Continue => {
                        if adapter.avail_in() == 0 {
                            break;
                        }
                    }
                }
            }
        }

        self.trim();
        self.built = true;
        Ok(self.points.len())
    }
}

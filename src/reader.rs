//! Seek + read over an already-built index.
//!
//! Grounded in zlib's `zran.c` example, `zran_seek`/`zran_read`: seek is
//! cheap (no decoding), read resumes decoding from the nearest access point
//! and discards forward to the target.

use std::io::{Read, Seek, SeekFrom};

use crate::adapter::{Adapter, Status};
use crate::error::{Error, Result};
use crate::point::AccessPoint;
use crate::store::{Domain, Index};

/// Seek origin, mirroring `fseek`'s `whence` parameter. Only `Set` (absolute,
/// from the start of the uncompressed stream) is supported; `Current` and
/// `End` are accepted as named variants but always fail with `InvalidArg`,
/// matching `zran.c`'s `if (whence != SEEK_SET) return -1;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

impl Index {
    /// Seeks to the access point covering uncompressed `offset`, repositions
    /// `source` to the point's compressed byte (minus the bit-straddle byte
    /// when `bits > 0`), and publishes `offset` as the new logical cursor.
    ///
    /// Cheap: performs no decoding.
    pub fn seek<R: Read + Seek>(
        &mut self,
        source: &mut R,
        offset: i64,
        whence: Whence,
    ) -> Result<Option<&AccessPoint>> {
        if whence != Whence::Set {
            return Err(Error::InvalidArg("whence must be Whence::Set"));
        }
        if offset < 0 {
            return Err(Error::InvalidArg("offset must be non-negative"));
        }
        if !self.built {
            return Err(Error::NotBuilt);
        }

        let offset = offset as u64;
        let point = self.locate(offset, Domain::Uncompressed)?;

        let seek_to = if point.bits > 0 {
            point.cmp_offset - 1
        } else {
            point.cmp_offset
        };
        log::debug!(
            "seek(offset={}) -> compressed offset {}",
            offset,
            seek_to
        );
        source.seek(SeekFrom::Start(seek_to))?;

        self.uncmp_seek_offset = offset;
        // Re-borrow after the mutation above so the returned reference has
        // the right lifetime; `locate` is re-run but is O(log n) and free of
        // side effects, so this costs nothing but a second binary search.
        Ok(Some(self.locate(offset, Domain::Uncompressed)?))
    }

    /// Reads up to `buf.len()` uncompressed bytes starting at the current
    /// logical cursor (`uncmp_seek_offset`), advancing the cursor by the
    /// number of bytes actually delivered.
    pub fn read<R: Read + Seek>(&mut self, source: &mut R, buf: &mut [u8]) -> Result<usize> {
        if !self.built {
            return Err(Error::NotBuilt);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let cmp_pos = source.stream_position()?;
        let target = self.uncmp_seek_offset;

        let point = self.locate(cmp_pos, Domain::Compressed)?.clone();

        let mut adapter = Adapter::new_raw()?;

        if point.bits > 0 {
            let mut byte = [0u8; 1];
            source.read_exact(&mut byte)?;
            adapter.prime(point.bits, byte[0] >> (8 - point.bits))?;
        }

        adapter.set_dictionary(&point.window)?;

        let window_size = self.window_size as usize;
        let readbuf_size = self.readbuf_size as usize;
        let mut input = vec![0u8; readbuf_size];
        let mut discard = vec![0u8; window_size];

        // `skip` doubles as "still have skip-or-delivery work to do", the
        // same way zran.c reuses one flag for both senses.
        let mut remaining_skip = target - point.uncmp_offset;
        let mut skip = true;

        'outer: loop {
            if remaining_skip == 0 && skip {
                adapter.set_output(buf);
                skip = false;
            } else if remaining_skip > window_size as u64 {
                adapter.set_output(&mut discard);
                remaining_skip -= window_size as u64;
            } else if remaining_skip != 0 {
                let n = remaining_skip as usize;
                adapter.set_output(&mut discard[..n]);
                remaining_skip = 0;
            }

            let mut stream_ended = false;
            loop {
                if adapter.avail_in() == 0 {
                    let n = source.read(&mut input)?;
                    if n == 0 {
                        return Err(Error::DataError("input exhausted before end of stream"));
                    }
                    adapter.set_input(&input[..n]);
                }

                match adapter.inflate_no_flush()? {
                    Status::EndOfStream => {
                        stream_ended = true;
                        break;
                    }
                    _ => {
                        if adapter.avail_out() == 0 {
                            break;
                        }
                    }
                }
            }

            if stream_ended || !skip {
                break 'outer;
            }
        }

        let bytes_read = if skip {
            0
        } else {
            buf.len() - adapter.avail_out() as usize
        };

        self.seek(source, (target + bytes_read as u64) as i64, Whence::Set)?;

        Ok(bytes_read)
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn seek_rejects_non_set_whence() {
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = gzip(&data);
        let mut index = Index::init(0, 0, 0).unwrap();
        let mut src = Cursor::new(compressed);
        index.build(&mut src).unwrap();

        let err = index.seek(&mut src, 0, Whence::Current).unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
        let err = index.seek(&mut src, 0, Whence::End).unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
    }

    #[test]
    fn seek_rejects_negative_offset() {
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = gzip(&data);
        let mut index = Index::init(0, 0, 0).unwrap();
        let mut src = Cursor::new(compressed);
        index.build(&mut src).unwrap();

        let err = index.seek(&mut src, -1, Whence::Set).unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
    }

    #[test]
    fn read_before_build_fails_not_built() {
        let mut index = Index::init(0, 0, 0).unwrap();
        let mut src = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 16];
        let err = index.read(&mut src, &mut buf).unwrap_err();
        assert!(matches!(err, Error::NotBuilt));
    }

    #[test]
    fn read_zero_length_is_noop() {
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = gzip(&data);
        let mut index = Index::init(0, 0, 0).unwrap();
        let mut src = Cursor::new(compressed);
        index.build(&mut src).unwrap();
        index.seek(&mut src, 0, Whence::Set).unwrap();

        let before = index.uncmp_seek_offset();
        let n = index.read(&mut src, &mut []).unwrap();
        assert_eq!(n, 0);
        assert_eq!(index.uncmp_seek_offset(), before);
    }

    #[test]
    fn seek_and_read_recovers_original_bytes() {
        let data: Vec<u8> = (0..10_000_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = gzip(&data);
        let mut index = Index::init(1_048_576, 0, 0).unwrap();
        let mut src = Cursor::new(compressed);
        index.build(&mut src).unwrap();

        for &offset in &[0u64, 1, 524_288, 1_048_575, 1_048_576, 5_242_880, 9_999_500] {
            index.seek(&mut src, offset as i64, Whence::Set).unwrap();
            let mut buf = vec![0u8; 1024];
            let n = index.read(&mut src, &mut buf).unwrap();
            let expected_len = std::cmp::min(1024, (data.len() as u64 - offset) as usize);
            assert_eq!(n, expected_len, "offset={offset}");
            assert_eq!(&buf[..n], &data[offset as usize..offset as usize + n]);
        }
    }

    #[test]
    fn read_advances_cursor_for_next_read() {
        let data: Vec<u8> = (0..2_000_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = gzip(&data);
        let mut index = Index::init(500_000, 0, 0).unwrap();
        let mut src = Cursor::new(compressed);
        index.build(&mut src).unwrap();

        index.seek(&mut src, 100, Whence::Set).unwrap();
        let mut buf = vec![0u8; 500];
        let n = index.read(&mut src, &mut buf).unwrap();
        assert_eq!(index.uncmp_seek_offset(), 100 + n as u64);

        let mut buf2 = vec![0u8; 500];
        let n2 = index.read(&mut src, &mut buf2).unwrap();
        assert_eq!(&buf2[..n2], &data[100 + n..100 + n + n2]);
    }
}

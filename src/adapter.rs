//! A safe wrapper around `libz-sys`'s `z_stream`, generalizing the
//! `ZStream` helper this crate's predecessor used for zinfo generation.
//!
//! This is the only module that touches raw zlib FFI; everything above it
//! (the builder, the reader) only sees `Adapter`.

use std::{
    alloc::{self, Layout},
    ffi::CStr,
    mem, ptr,
};

use libc::{c_int, c_void};
use libz_sys::{
    inflate, inflateEnd, inflateInit2_, inflatePrime, inflateSetDictionary, uInt, z_stream,
    zlibVersion, Z_BLOCK, Z_BUF_ERROR, Z_DATA_ERROR, Z_MEM_ERROR, Z_NEED_DICT, Z_NO_FLUSH,
    Z_STREAM_END, Z_STREAM_ERROR, Z_VERSION_ERROR,
};

use crate::error::Error;

/// `windowBits` passed to `inflateInit2_` to auto-detect zlib or gzip framing.
const AUTO_DETECT_WINDOW_BITS: c_int = 47;
/// `windowBits` passed to `inflateInit2_` for raw, headerless DEFLATE.
const RAW_WINDOW_BITS: c_int = -15;

/// Outcome of a single `inflate` call, beyond plain success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// Needs more input or output space to keep going.
    Continue,
    /// Reached the end of a DEFLATE block (only possible in block mode).
    EndOfBlock,
    /// Reached the end of the stream.
    EndOfStream,
}

/// A single inflate context. Never reused across `seek`s on purpose (see
/// design notes in `reader.rs`): cheap to build, trivial to reason about.
pub(crate) struct Adapter {
    stream: Box<z_stream>,
}

impl Adapter {
    /// Automatic zlib/gzip header detection, for the forward build pass.
    pub(crate) fn new_auto() -> Result<Self, Error> {
        Self::new(AUTO_DETECT_WINDOW_BITS)
    }

    /// Raw DEFLATE, no framing: used to resume mid-stream from an access point.
    pub(crate) fn new_raw() -> Result<Self, Error> {
        Self::new(RAW_WINDOW_BITS)
    }

    fn new(window_bits: c_int) -> Result<Self, Error> {
        let mut stream = Box::new(z_stream {
            next_in: ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null_mut(),
            state: ptr::null_mut(),
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
            zalloc,
            zfree,
        });
        check(
            unsafe {
                inflateInit2_(
                    stream.as_mut() as *mut z_stream,
                    window_bits,
                    zlibVersion(),
                    mem::size_of::<z_stream>() as c_int,
                )
            },
            None,
        )?;
        Ok(Self { stream })
    }

    /// Points the stream's input cursor at `buf`. Caller must keep `buf`
    /// alive and unmoved until the next `inflate*` call consumes it.
    pub(crate) fn set_input(&mut self, buf: &[u8]) {
        self.stream.avail_in = buf.len() as u32;
        self.stream.next_in = buf.as_ptr() as *mut u8;
    }

    /// Points the stream's output cursor at `buf`.
    pub(crate) fn set_output(&mut self, buf: &mut [u8]) {
        self.stream.avail_out = buf.len() as u32;
        self.stream.next_out = buf.as_mut_ptr();
    }

    pub(crate) fn avail_in(&self) -> u32 {
        self.stream.avail_in
    }

    pub(crate) fn avail_out(&self) -> u32 {
        self.stream.avail_out
    }

    /// Low 3 bits = sub-byte bit remainder; bit 7 = ended-a-block; bit 6 =
    /// that block was the last one. Exposed raw because the builder needs
    /// all three facets simultaneously.
    pub(crate) fn data_type(&self) -> i32 {
        self.stream.data_type
    }

    /// Inflate, stopping at the end of every DEFLATE block (`Z_BLOCK`).
    pub(crate) fn inflate_block(&mut self) -> Result<Status, Error> {
        self.inflate(Z_BLOCK)
    }

    /// Inflate with ordinary flush semantics, consuming/producing as much
    /// as the buffers allow.
    pub(crate) fn inflate_no_flush(&mut self) -> Result<Status, Error> {
        self.inflate(Z_NO_FLUSH)
    }

    fn inflate(&mut self, flush: c_int) -> Result<Status, Error> {
        let ret = check(
            unsafe { inflate(self.stream.as_mut() as *mut z_stream, flush) },
            Some(&self.stream),
        )?;
        if ret == Z_NEED_DICT {
            return Err(Error::DataError("dictionary needed unexpectedly"));
        }
        if ret == Z_STREAM_END {
            return Ok(Status::EndOfStream);
        }
        let ended_block = self.data_type() & 128 != 0;
        if ended_block {
            Ok(Status::EndOfBlock)
        } else {
            Ok(Status::Continue)
        }
    }

    /// Whether the most recently ended block was the final block of the stream.
    pub(crate) fn is_last_block(&self) -> bool {
        self.data_type() & 64 != 0
    }

    /// Sub-byte bit remainder of the current stream position, in [0, 7].
    pub(crate) fn bit_remainder(&self) -> u8 {
        (self.data_type() & 7) as u8
    }

    /// Inject the low `bits` bits of `value` as the next bits of the
    /// bitstream. `bits` must be in [0, 7].
    pub(crate) fn prime(&mut self, bits: u8, value: u8) -> Result<(), Error> {
        check(
            unsafe {
                inflatePrime(
                    self.stream.as_mut() as *mut z_stream,
                    bits as c_int,
                    value as c_int,
                )
            },
            Some(&self.stream),
        )?;
        Ok(())
    }

    /// Install `dict` as the back-reference history window.
    pub(crate) fn set_dictionary(&mut self, dict: &[u8]) -> Result<(), Error> {
        check(
            unsafe {
                inflateSetDictionary(
                    self.stream.as_mut() as *mut z_stream,
                    dict.as_ptr(),
                    dict.len() as uInt,
                )
            },
            Some(&self.stream),
        )?;
        Ok(())
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        unsafe {
            inflateEnd(self.stream.as_mut() as *mut z_stream);
        }
    }
}

/// Converts a zlib return code into an `Error`. zlib's `z_stream.msg`, when
/// set, is only used for `log`-level diagnostics; the error kind itself is
/// determined by the return code per the contract in `error.rs`.
fn check(ret: c_int, stream: Option<&z_stream>) -> Result<c_int, Error> {
    if ret < 0 {
        if let Some(stream) = stream {
            if !stream.msg.is_null() {
                let msg = unsafe { CStr::from_ptr(stream.msg).to_string_lossy() };
                log::debug!("zlib error {}: {}", ret, msg);
            }
        }
    }
    match ret {
        Z_STREAM_ERROR => Err(Error::DataError("zlib stream error")),
        Z_DATA_ERROR => Err(Error::DataError("zlib data error")),
        Z_MEM_ERROR => Err(Error::OutOfMemory),
        Z_BUF_ERROR => Err(Error::DataError("zlib buf error")),
        Z_VERSION_ERROR => Err(Error::DataError("zlib version error")),
        ret if ret < 0 => Err(Error::DataError("zlib unknown error")),
        ret => Ok(ret),
    }
}

const ALIGN: usize = std::mem::align_of::<usize>();
type AllocSize = uInt;

fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

extern "C" fn zalloc(_ptr: *mut c_void, items: AllocSize, item_size: AllocSize) -> *mut c_void {
    // zfree doesn't receive a size, so stash it in a header word before the
    // allocation we hand back to zlib.
    let size = match items
        .checked_mul(item_size)
        .and_then(|i| usize::try_from(i).ok())
        .map(|size| align_up(size, ALIGN))
        .and_then(|i| i.checked_add(std::mem::size_of::<usize>()))
    {
        Some(i) => i,
        None => return ptr::null_mut(),
    };

    let layout = match Layout::from_size_align(size, ALIGN) {
        Ok(layout) => layout,
        Err(_) => return ptr::null_mut(),
    };

    unsafe {
        let ptr = alloc::alloc(layout) as *mut usize;
        if ptr.is_null() {
            return ptr as *mut c_void;
        }
        *ptr = size;
        ptr.add(1) as *mut c_void
    }
}

extern "C" fn zfree(_ptr: *mut c_void, address: *mut c_void) {
    unsafe {
        let ptr = (address as *mut usize).offset(-1);
        let size = *ptr;
        let layout = Layout::from_size_align_unchecked(size, ALIGN);
        alloc::dealloc(ptr as *mut u8, layout)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auto_and_raw_construct() {
        Adapter::new_auto().expect("auto adapter should construct");
        Adapter::new_raw().expect("raw adapter should construct");
    }

    #[test]
    fn inflate_block_round_trip() {
        use std::io::Write;

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hi").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut adapter = Adapter::new_auto().unwrap();
        adapter.set_input(&compressed);
        let mut out = [0u8; 16];
        adapter.set_output(&mut out);
        let status = adapter.inflate_block().unwrap();
        assert!(matches!(status, Status::EndOfBlock | Status::EndOfStream));
    }
}

//! # librtlsdr Runtime Bindings
//!
//! FFI to librtlsdr for RTL2832U-based tuners, loaded at runtime with
//! `libloading` so the binary carries no compile-time dependency and
//! still starts (with a clear error) on machines without the library.
//!
//! Only the primitives the receiver consumes are bound:
//!
//! - `rtlsdr_get_device_count` / `rtlsdr_get_device_name`
//! - `rtlsdr_open` / `rtlsdr_close`
//! - `rtlsdr_set_sample_rate` / `rtlsdr_get_sample_rate`
//! - `rtlsdr_set_center_freq` / `rtlsdr_get_center_freq`
//! - `rtlsdr_set_tuner_gain_mode` / `rtlsdr_set_tuner_gain` /
//!   `rtlsdr_get_tuner_gains`
//! - `rtlsdr_reset_buffer`
//! - `rtlsdr_read_sync`
//!
//! Samples arrive as unsigned 8-bit I/Q pairs `[I0, Q0, I1, Q1, ...]`
//! with the zero level at 127.5.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::ptr;
use std::sync::OnceLock;

use libloading::{Library, Symbol};

/// Opaque librtlsdr device pointer.
type DevPtr = *mut c_void;

/// Errors surfaced by the tuner layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TunerError {
    #[error("librtlsdr not found - install the rtl-sdr package")]
    LibraryNotFound,

    #[error("failed to open RTL-SDR device #{index}: error code {code}")]
    OpenFailed { index: u32, code: i32 },

    #[error("device returned a null handle")]
    InvalidHandle,

    #[error("{0} failed: error code {1}")]
    OperationFailed(&'static str, i32),

    #[error("device read failed: error code {0}")]
    ReadFailed(i32),
}

/// Loaded library plus the resolved function pointers.
struct RtlLib {
    _lib: Library,
    get_device_count: Symbol<'static, unsafe extern "C" fn() -> c_uint>,
    get_device_name: Symbol<'static, unsafe extern "C" fn(c_uint) -> *const c_char>,
    open: Symbol<'static, unsafe extern "C" fn(*mut DevPtr, c_uint) -> c_int>,
    close: Symbol<'static, unsafe extern "C" fn(DevPtr) -> c_int>,
    set_sample_rate: Symbol<'static, unsafe extern "C" fn(DevPtr, c_uint) -> c_int>,
    get_sample_rate: Symbol<'static, unsafe extern "C" fn(DevPtr) -> c_uint>,
    set_center_freq: Symbol<'static, unsafe extern "C" fn(DevPtr, c_uint) -> c_int>,
    get_center_freq: Symbol<'static, unsafe extern "C" fn(DevPtr) -> c_uint>,
    set_tuner_gain_mode: Symbol<'static, unsafe extern "C" fn(DevPtr, c_int) -> c_int>,
    set_tuner_gain: Symbol<'static, unsafe extern "C" fn(DevPtr, c_int) -> c_int>,
    get_tuner_gains: Symbol<'static, unsafe extern "C" fn(DevPtr, *mut c_int) -> c_int>,
    reset_buffer: Symbol<'static, unsafe extern "C" fn(DevPtr) -> c_int>,
    read_sync:
        Symbol<'static, unsafe extern "C" fn(DevPtr, *mut c_void, c_int, *mut c_int) -> c_int>,
}

static RTL_LIB: OnceLock<Option<RtlLib>> = OnceLock::new();

#[cfg(target_os = "linux")]
const LIB_NAMES: &[&str] = &["librtlsdr.so.0", "librtlsdr.so"];

#[cfg(target_os = "macos")]
const LIB_NAMES: &[&str] = &["librtlsdr.dylib", "librtlsdr.0.dylib"];

#[cfg(target_os = "windows")]
const LIB_NAMES: &[&str] = &["rtlsdr.dll", "librtlsdr.dll"];

fn load_library() -> Option<RtlLib> {
    for name in LIB_NAMES {
        let Ok(lib) = (unsafe { Library::new(name) }) else {
            continue;
        };

        let result = unsafe {
            // The symbols borrow the library; keeping it in the struct
            // keeps the 'static lifetime honest.
            let lib_ref: &'static Library = std::mem::transmute(&lib);

            Some(RtlLib {
                get_device_count: lib_ref.get(b"rtlsdr_get_device_count\0").ok()?,
                get_device_name: lib_ref.get(b"rtlsdr_get_device_name\0").ok()?,
                open: lib_ref.get(b"rtlsdr_open\0").ok()?,
                close: lib_ref.get(b"rtlsdr_close\0").ok()?,
                set_sample_rate: lib_ref.get(b"rtlsdr_set_sample_rate\0").ok()?,
                get_sample_rate: lib_ref.get(b"rtlsdr_get_sample_rate\0").ok()?,
                set_center_freq: lib_ref.get(b"rtlsdr_set_center_freq\0").ok()?,
                get_center_freq: lib_ref.get(b"rtlsdr_get_center_freq\0").ok()?,
                set_tuner_gain_mode: lib_ref.get(b"rtlsdr_set_tuner_gain_mode\0").ok()?,
                set_tuner_gain: lib_ref.get(b"rtlsdr_set_tuner_gain\0").ok()?,
                get_tuner_gains: lib_ref.get(b"rtlsdr_get_tuner_gains\0").ok()?,
                reset_buffer: lib_ref.get(b"rtlsdr_reset_buffer\0").ok()?,
                read_sync: lib_ref.get(b"rtlsdr_read_sync\0").ok()?,
                _lib: lib,
            })
        };

        if result.is_some() {
            tracing::info!("loaded RTL-SDR library: {}", name);
            return result;
        }
    }
    tracing::debug!("RTL-SDR library not found");
    None
}

fn lib() -> Option<&'static RtlLib> {
    RTL_LIB.get_or_init(load_library).as_ref()
}

/// Whether librtlsdr could be loaded on this machine.
pub fn is_available() -> bool {
    lib().is_some()
}

/// Number of connected RTL-SDR devices.
pub fn device_count() -> u32 {
    lib().map(|l| unsafe { (l.get_device_count)() }).unwrap_or(0)
}

/// Device name by index, if the driver knows one.
pub fn device_name(index: u32) -> Option<String> {
    lib().and_then(|l| {
        let name = unsafe { (l.get_device_name)(index) };
        if name.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(name).to_string_lossy().into_owned() })
        }
    })
}

fn check(op: &'static str, ret: c_int) -> Result<(), TunerError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(TunerError::OperationFailed(op, ret))
    }
}

/// An open RTL-SDR device.
///
/// Exclusive owner of the underlying handle: not `Clone`, closed exactly
/// once on drop. Moving the value transfers ownership.
pub struct TunerHandle {
    dev: DevPtr,
    index: u32,
    /// Supported gain steps in tenths of a dB, as reported by the tuner.
    gains: Vec<i32>,
}

// The handle is only ever driven from one thread at a time; librtlsdr's
// synchronous calls need no further synchronization for that pattern.
unsafe impl Send for TunerHandle {}

impl TunerHandle {
    /// Claim the device at `index`.
    pub fn open(index: u32) -> Result<Self, TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;

        let mut dev: DevPtr = ptr::null_mut();
        let ret = unsafe { (lib.open)(&mut dev, index) };
        if ret != 0 {
            return Err(TunerError::OpenFailed { index, code: ret });
        }
        if dev.is_null() {
            return Err(TunerError::InvalidHandle);
        }

        let mut steps = [0 as c_int; 64];
        let count = unsafe { (lib.get_tuner_gains)(dev, steps.as_mut_ptr()) };
        let gains = if count > 0 {
            steps[..count as usize].to_vec()
        } else {
            Vec::new()
        };

        tracing::info!(
            "opened RTL-SDR device #{} ({}) with {} gain steps",
            index,
            device_name(index).unwrap_or_else(|| "unknown".into()),
            gains.len()
        );

        Ok(Self { dev, index, gains })
    }

    /// The nearest supported gain step, in tenths of a dB.
    pub fn nearest_gain(&self, tenth_db: i32) -> i32 {
        self.gains
            .iter()
            .min_by_key(|&&g| (g - tenth_db).abs())
            .copied()
            .unwrap_or(tenth_db)
    }

    pub fn set_sample_rate(&mut self, rate_hz: u32) -> Result<(), TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;
        check("set_sample_rate", unsafe {
            (lib.set_sample_rate)(self.dev, rate_hz)
        })
    }

    /// The exact rate the resampler settled on.
    pub fn sample_rate(&self) -> u32 {
        lib().map(|l| unsafe { (l.get_sample_rate)(self.dev) }).unwrap_or(0)
    }

    pub fn set_center_freq(&mut self, freq_hz: u32) -> Result<(), TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;
        check("set_center_freq", unsafe {
            (lib.set_center_freq)(self.dev, freq_hz)
        })
    }

    pub fn center_freq(&self) -> u32 {
        lib().map(|l| unsafe { (l.get_center_freq)(self.dev) }).unwrap_or(0)
    }

    /// Switch between automatic (false) and manual (true) tuner gain.
    pub fn set_tuner_gain_mode(&mut self, manual: bool) -> Result<(), TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;
        check("set_tuner_gain_mode", unsafe {
            (lib.set_tuner_gain_mode)(self.dev, manual as c_int)
        })
    }

    /// Set the tuner gain in tenths of a dB, snapped to the nearest
    /// supported step. Returns the step actually applied.
    pub fn set_tuner_gain(&mut self, tenth_db: i32) -> Result<i32, TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;
        let snapped = self.nearest_gain(tenth_db);
        check("set_tuner_gain", unsafe {
            (lib.set_tuner_gain)(self.dev, snapped)
        })?;
        Ok(snapped)
    }

    /// Reset the driver's streaming buffer. Mandatory before reading.
    pub fn reset_buffer(&mut self) -> Result<(), TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;
        check("reset_buffer", unsafe { (lib.reset_buffer)(self.dev) })
    }

    /// Blocking bulk read of raw I/Q bytes into `buf`.
    ///
    /// Returns the number of bytes actually read, which the driver may
    /// leave short of `buf.len()`.
    pub fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize, TunerError> {
        let lib = lib().ok_or(TunerError::LibraryNotFound)?;

        let mut n_read: c_int = 0;
        let ret = unsafe {
            (lib.read_sync)(
                self.dev,
                buf.as_mut_ptr() as *mut c_void,
                buf.len() as c_int,
                &mut n_read,
            )
        };

        if ret != 0 {
            Err(TunerError::ReadFailed(ret))
        } else {
            Ok(n_read as usize)
        }
    }
}

impl Drop for TunerHandle {
    fn drop(&mut self) {
        if let Some(lib) = lib() {
            tracing::debug!("closing RTL-SDR device #{}", self.index);
            unsafe { (lib.close)(self.dev) };
        }
    }
}

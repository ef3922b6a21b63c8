//! Native binary layouts of the kernel records we decode.
//!
//! Every record is described by an explicit offset table and read through
//! [`ByteReader`], which applies the byte order and `long` width of a
//! [`NativeLayout`]. Nothing here reinterprets memory, so all decoders can be
//! exercised with hand-built buffers on any host.

use crate::error::LayoutError;

/// Number of CPU states reported per CPU by `kern.cp_times`.
pub const CPU_STATES: usize = 5;

/// Size of `struct clockinfo` (five `int` fields).
pub const CLOCKINFO_SIZE: usize = 5 * 4;

/// Length of `device_name` in `struct devstat` (`DEVSTAT_NAME_LEN`).
pub const DEVSTAT_NAME_LEN: usize = 16;

/// `DEVSTAT_VERSION` this decoder understands.
pub const DEVSTAT_VERSION: i32 = 6;

/// Scale of the fractional part of a `struct bintime` (2^-64).
const BINTIME_SCALE: f64 = 1.0 / 18_446_744_073_709_551_616.0;

/// Block size assumed by `devstat_compute_statistics(3)` when a device reports none.
const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Byte order of a raw kernel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Platform parameters that change how raw kernel buffers are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeLayout {
    /// Width of a C `long` in bytes (4 or 8).
    pub long_width: usize,
    pub endian: Endian,
}

impl NativeLayout {
    /// Layout of the running host.
    pub const fn host() -> Self {
        Self {
            long_width: std::mem::size_of::<libc::c_long>(),
            endian: if cfg!(target_endian = "big") {
                Endian::Big
            } else {
                Endian::Little
            },
        }
    }

    /// 64-bit little endian (amd64, arm64).
    pub const fn lp64_le() -> Self {
        Self {
            long_width: 8,
            endian: Endian::Little,
        }
    }
}

impl Default for NativeLayout {
    fn default() -> Self {
        Self::host()
    }
}

/// Bounds-checked reader over a raw kernel buffer.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    layout: NativeLayout,
    record: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], layout: NativeLayout, record: &'static str) -> Self {
        Self {
            buf,
            layout,
            record,
        }
    }

    fn bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N], LayoutError> {
        offset
            .checked_add(N)
            .and_then(|end| self.buf.get(offset..end))
            .and_then(|slice| slice.try_into().ok())
            .ok_or(LayoutError::Truncated {
                record: self.record,
                expected: offset.saturating_add(N),
                actual: self.buf.len(),
            })
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32, LayoutError> {
        let raw = self.bytes::<4>(offset)?;
        Ok(match self.layout.endian {
            Endian::Little => i32::from_le_bytes(raw),
            Endian::Big => i32::from_be_bytes(raw),
        })
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, LayoutError> {
        let raw = self.bytes::<4>(offset)?;
        Ok(match self.layout.endian {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        })
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64, LayoutError> {
        let raw = self.bytes::<8>(offset)?;
        Ok(match self.layout.endian {
            Endian::Little => u64::from_le_bytes(raw),
            Endian::Big => u64::from_be_bytes(raw),
        })
    }

    /// Reads a signed C `long` of the layout's native width.
    pub fn long_at(&self, offset: usize) -> Result<i64, LayoutError> {
        match self.layout.long_width {
            4 => self.i32_at(offset).map(i64::from),
            8 => self.u64_at(offset).map(|v| v as i64),
            width => Err(LayoutError::UnsupportedWidth { width }),
        }
    }

    /// Reads a NUL-terminated C string stored in a fixed-size array.
    pub fn c_string_at(&self, offset: usize, len: usize) -> Result<String, LayoutError> {
        let field = offset
            .checked_add(len)
            .and_then(|end| self.buf.get(offset..end))
            .ok_or(LayoutError::Truncated {
                record: self.record,
                expected: offset.saturating_add(len),
                actual: self.buf.len(),
            })?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(String::from_utf8_lossy(&field[..end]).into_owned())
    }
}

/// `struct clockinfo` as returned by `kern.clockrate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockInfo {
    /// Clock frequency.
    pub hz: i32,
    /// Microseconds per `hz` tick.
    pub tick: i32,
    pub spare: i32,
    /// Statistics clock frequency.
    pub stathz: i32,
    /// Profiling clock frequency.
    pub profhz: i32,
}

impl ClockInfo {
    pub fn decode(buf: &[u8], layout: NativeLayout) -> Result<Self, LayoutError> {
        if buf.len() < CLOCKINFO_SIZE {
            return Err(LayoutError::Truncated {
                record: "kern.clockrate",
                expected: CLOCKINFO_SIZE,
                actual: buf.len(),
            });
        }
        let r = ByteReader::new(buf, layout, "kern.clockrate");
        Ok(Self {
            hz: r.i32_at(0)?,
            tick: r.i32_at(4)?,
            spare: r.i32_at(8)?,
            stathz: r.i32_at(12)?,
            profhz: r.i32_at(16)?,
        })
    }

    /// Frequency the `kern.cp_times` counters tick at: `stathz`, or `hz` when
    /// the statistics clock is not running.
    pub fn tick_frequency(&self) -> Result<f64, LayoutError> {
        if self.stathz > 0 {
            Ok(f64::from(self.stathz))
        } else if self.hz > 0 {
            Ok(f64::from(self.hz))
        } else {
            Err(LayoutError::NonPositiveFrequency {
                hz: self.hz,
                stathz: self.stathz,
            })
        }
    }
}

/// Seconds one CPU spent in each state since boot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuTimes {
    pub index: usize,
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub interrupt: f64,
    pub idle: f64,
}

impl CpuTimes {
    /// `(mode label, seconds)` in `CP_USER..CP_IDLE` order.
    pub fn modes(&self) -> [(&'static str, f64); CPU_STATES] {
        [
            ("user", self.user),
            ("nice", self.nice),
            ("system", self.system),
            ("interrupt", self.interrupt),
            ("idle", self.idle),
        ]
    }
}

/// Decodes `kern.cp_times` into per-CPU seconds.
///
/// The buffer holds `ncpu * CPU_STATES` native `long` tick counters. Each is
/// divided by `frequency`. A length that is not a whole number of CPUs is
/// rejected rather than truncated.
pub fn decode_cp_times(
    buf: &[u8],
    layout: NativeLayout,
    frequency: f64,
) -> Result<Vec<CpuTimes>, LayoutError> {
    if frequency.is_nan() || frequency <= 0.0 {
        return Err(LayoutError::InvalidDivisor { frequency });
    }
    let width = layout.long_width;
    if width != 4 && width != 8 {
        return Err(LayoutError::UnsupportedWidth { width });
    }
    let stride = CPU_STATES * width;
    if buf.len() % stride != 0 {
        return Err(LayoutError::Misaligned {
            record: "kern.cp_times",
            len: buf.len(),
            stride,
        });
    }

    let r = ByteReader::new(buf, layout, "kern.cp_times");
    let seconds = |offset: usize| -> Result<f64, LayoutError> {
        Ok(r.long_at(offset)? as f64 / frequency)
    };

    (0..buf.len() / stride)
        .map(|index| {
            let base = index * stride;
            Ok(CpuTimes {
                index,
                user: seconds(base)?,
                nice: seconds(base + width)?,
                system: seconds(base + 2 * width)?,
                interrupt: seconds(base + 3 * width)?,
                idle: seconds(base + 4 * width)?,
            })
        })
        .collect()
}

/// Field offsets of `struct devstat` (`sys/devicestat.h`, version 6).
///
/// Only the LP64 table ([`DEVSTAT_LP64`]) is known. On ILP32 FreeBSD
/// (i386, armv7) [`DevstatLayout::for_layout`] returns `None` and devstat
/// queries fail with `KernelError::Unsupported`; `kern.cp_times` still
/// decodes there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevstatLayout {
    pub record_size: usize,
    pub device_name: usize,
    pub unit_number: usize,
    /// `u_int64_t bytes[DEVSTAT_N_TRANS_FLAGS]`
    pub bytes: usize,
    /// `u_int64_t operations[DEVSTAT_N_TRANS_FLAGS]`
    pub operations: usize,
    /// `struct bintime duration[DEVSTAT_N_TRANS_FLAGS]`
    pub duration: usize,
    pub busy_time: usize,
    pub block_size: usize,
    /// Size of `struct bintime` (`time_t sec; uint64_t frac;`).
    pub bintime_size: usize,
}

/// LP64 targets: 8-byte `time_t`, pointers and `long`.
pub const DEVSTAT_LP64: DevstatLayout = DevstatLayout {
    record_size: 288,
    device_name: 44,
    unit_number: 60,
    bytes: 64,
    operations: 96,
    duration: 128,
    busy_time: 192,
    block_size: 224,
    bintime_size: 16,
};

impl DevstatLayout {
    /// Offset table for the given native layout. `None` unless `long` is
    /// 8 bytes wide.
    pub fn for_layout(layout: NativeLayout) -> Option<Self> {
        (layout.long_width == 8).then_some(DEVSTAT_LP64)
    }
}

/// Index into the per-transaction arrays (`devstat_trans_flags`).
#[derive(Debug, Clone, Copy)]
enum Trans {
    NoData = 0,
    Read = 1,
    Write = 2,
    Free = 3,
}

/// Bytes moved per transaction type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounters {
    pub read: u64,
    pub write: u64,
    pub free: u64,
}

/// Completed operations per transaction type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounters {
    pub other: u64,
    pub read: u64,
    pub write: u64,
    pub free: u64,
}

/// Seconds spent servicing each transaction type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DurationCounters {
    pub other: f64,
    pub read: f64,
    pub write: f64,
    pub free: f64,
}

/// Lifetime statistics of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStats {
    pub device: String,
    pub unit: i32,
    pub bytes: ByteCounters,
    pub transfers: TransferCounters,
    pub duration: DurationCounters,
    pub busy_time: f64,
    pub blocks: u64,
}

impl DeviceStats {
    /// Device label, e.g. `ada0`.
    pub fn display_name(&self) -> String {
        format!("{}{}", self.device, self.unit)
    }

    /// Decodes one `struct devstat` record into lifetime totals, the way
    /// `devstat_compute_statistics(3)` does with no previous snapshot.
    pub fn decode(
        record: &[u8],
        table: &DevstatLayout,
        layout: NativeLayout,
    ) -> Result<Self, LayoutError> {
        if record.len() != table.record_size {
            return Err(LayoutError::Size {
                record: "struct devstat",
                expected: table.record_size,
                actual: record.len(),
            });
        }
        let r = ByteReader::new(record, layout, "struct devstat");

        let bytes_at = |t: Trans| r.u64_at(table.bytes + 8 * t as usize);
        let ops_at = |t: Trans| r.u64_at(table.operations + 8 * t as usize);
        let bintime_at = |offset: usize| -> Result<f64, LayoutError> {
            let sec = r.long_at(offset)?;
            let frac = r.u64_at(offset + table.bintime_size - 8)?;
            Ok(sec as f64 + frac as f64 * BINTIME_SCALE)
        };
        let duration_at =
            |t: Trans| bintime_at(table.duration + table.bintime_size * t as usize);

        let bytes = ByteCounters {
            read: bytes_at(Trans::Read)?,
            write: bytes_at(Trans::Write)?,
            free: bytes_at(Trans::Free)?,
        };
        let block_size = match u64::from(r.u32_at(table.block_size)?) {
            0 => DEFAULT_BLOCK_SIZE,
            size => size,
        };
        let total_bytes = bytes
            .read
            .wrapping_add(bytes.write)
            .wrapping_add(bytes.free);

        Ok(Self {
            device: r.c_string_at(table.device_name, DEVSTAT_NAME_LEN)?,
            unit: r.i32_at(table.unit_number)?,
            bytes,
            transfers: TransferCounters {
                other: ops_at(Trans::NoData)?,
                read: ops_at(Trans::Read)?,
                write: ops_at(Trans::Write)?,
                free: ops_at(Trans::Free)?,
            },
            duration: DurationCounters {
                other: duration_at(Trans::NoData)?,
                read: duration_at(Trans::Read)?,
                write: duration_at(Trans::Write)?,
                free: duration_at(Trans::Free)?,
            },
            busy_time: bintime_at(table.busy_time)?,
            blocks: total_bytes / block_size,
        })
    }
}

/// Splits a `kern.devstat.all` buffer (a `long` generation followed by packed
/// records) into its records.
pub fn devstat_records<'a>(
    buf: &'a [u8],
    table: &DevstatLayout,
    layout: NativeLayout,
) -> Result<impl ExactSizeIterator<Item = &'a [u8]>, LayoutError> {
    let header = layout.long_width;
    if buf.len() < header {
        return Err(LayoutError::Truncated {
            record: "kern.devstat.all",
            expected: header,
            actual: buf.len(),
        });
    }
    let body = &buf[header..];
    if body.len() % table.record_size != 0 {
        return Err(LayoutError::Misaligned {
            record: "kern.devstat.all",
            len: body.len(),
            stride: table.record_size,
        });
    }
    Ok(body.chunks_exact(table.record_size))
}

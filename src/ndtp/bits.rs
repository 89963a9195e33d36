//! MSB-first bit packing for fixed-width integers.
//!
//! Values are written starting at the most significant unused bit of the
//! current byte and spill into the next byte when it fills. The final partial
//! byte is zero-padded, so a reader that does not know the value count cannot
//! tell padding from data; pass `count` to [`unpack`] when that matters.
//!
//! ```text
//! pack([7, 5, 3, 1], 12)  => 00 70 05 00 30 01
//! pack([1, 2, 3, 0], 2)   => 6C
//! ```

use crate::ndtp::error::{NdtpError, NdtpResult};

/// Largest bit width supported by the packer.
pub const MAX_BIT_WIDTH: u8 = 32;

/// Number of bytes needed to hold `count` values of `bit_width` bits.
#[inline]
pub fn packed_len(count: usize, bit_width: u8) -> usize {
    (count * bit_width as usize).div_ceil(8)
}

fn check_bit_width(bit_width: u8) -> NdtpResult<()> {
    if bit_width == 0 || bit_width > MAX_BIT_WIDTH {
        return Err(NdtpError::InvalidBitWidth(bit_width));
    }
    Ok(())
}

#[inline]
fn mask(bit_width: u8) -> u32 {
    if bit_width >= 32 {
        u32::MAX
    } else {
        (1u32 << bit_width) - 1
    }
}

/// Partial-byte accumulator that emits bytes as they fill.
struct BitWriter {
    out: Vec<u8>,
    acc: u8,
    used: u8,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            acc: 0,
            used: 0,
        }
    }

    fn write(&mut self, value: u32, width: u8) {
        let mut remaining = width;
        while remaining > 0 {
            let free = 8 - self.used;
            let take = free.min(remaining);
            let shift = remaining - take;
            let bits = ((value >> shift) & mask(take)) as u8;
            self.acc |= bits << (free - take);
            self.used += take;
            remaining -= take;
            if self.used == 8 {
                self.out.push(self.acc);
                self.acc = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.out.push(self.acc);
        }
        self.out
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    /// Caller guarantees `remaining_bits() >= width`.
    fn read(&mut self, width: u8) -> u32 {
        let mut value = 0u32;
        let mut remaining = width;
        while remaining > 0 {
            let byte = self.data[self.bit_pos / 8];
            let offset = (self.bit_pos % 8) as u8;
            let avail = 8 - offset;
            let take = avail.min(remaining);
            let bits = (byte >> (avail - take)) as u32 & mask(take);
            value = if take >= 32 { bits } else { (value << take) | bits };
            self.bit_pos += take as usize;
            remaining -= take;
        }
        value
    }
}

/// Pack unsigned values into an MSB-first bit stream.
///
/// Fails if `bit_width` is outside `1..=32` or any value needs more than
/// `bit_width` bits.
pub fn pack(values: &[u32], bit_width: u8) -> NdtpResult<Vec<u8>> {
    check_bit_width(bit_width)?;
    let limit = mask(bit_width);
    let mut writer = BitWriter::with_capacity(packed_len(values.len(), bit_width));
    for &value in values {
        if value > limit {
            return Err(NdtpError::ValueOutOfRange {
                value: value as i64,
                bit_width,
            });
        }
        writer.write(value, bit_width);
    }
    Ok(writer.finish())
}

/// Unpack unsigned values from an MSB-first bit stream.
///
/// With `count = Some(n)` exactly `n` values are read and any trailing
/// padding is ignored. With `count = None` every whole value is read and
/// leftover bits are reported as [`NdtpError::IncompleteTrailingValue`].
pub fn unpack(data: &[u8], bit_width: u8, count: Option<usize>) -> NdtpResult<Vec<u32>> {
    check_bit_width(bit_width)?;
    let mut reader = BitReader::new(data);
    let width = bit_width as usize;

    let n = match count {
        Some(n) => {
            let needed = packed_len(n, bit_width);
            if needed > data.len() {
                return Err(NdtpError::Truncated {
                    needed,
                    available: data.len(),
                });
            }
            n
        }
        None => {
            let total = reader.remaining_bits();
            if total % width != 0 {
                return Err(NdtpError::IncompleteTrailingValue {
                    remaining_bits: total % width,
                });
            }
            total / width
        }
    };

    Ok((0..n).map(|_| reader.read(bit_width)).collect())
}

/// Pack signed values as `bit_width`-bit two's complement.
pub fn pack_signed(values: &[i32], bit_width: u8) -> NdtpResult<Vec<u8>> {
    check_bit_width(bit_width)?;
    let min = -(1i64 << (bit_width - 1));
    let max = (1i64 << (bit_width - 1)) - 1;
    let limit = mask(bit_width);
    let mut writer = BitWriter::with_capacity(packed_len(values.len(), bit_width));
    for &value in values {
        let wide = value as i64;
        if wide < min || wide > max {
            return Err(NdtpError::ValueOutOfRange {
                value: wide,
                bit_width,
            });
        }
        writer.write(value as u32 & limit, bit_width);
    }
    Ok(writer.finish())
}

/// Unpack `bit_width`-bit two's complement values, sign-extending each.
pub fn unpack_signed(data: &[u8], bit_width: u8, count: Option<usize>) -> NdtpResult<Vec<i32>> {
    let raw = unpack(data, bit_width, count)?;
    let shift = 32 - bit_width as u32;
    Ok(raw
        .into_iter()
        .map(|v| ((v << shift) as i32) >> shift)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_reference_vectors() {
        assert_eq!(pack(&[1, 2, 3, 0], 2).unwrap(), vec![0x6C]);
        assert_eq!(
            pack(&[7, 5, 3, 1], 12).unwrap(),
            vec![0x00, 0x70, 0x05, 0x00, 0x30, 0x01]
        );
        assert_eq!(pack(&[1, 2, 3, 4], 8).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pack_rejects_oversized_value() {
        assert_eq!(
            pack(&[8], 3),
            Err(NdtpError::ValueOutOfRange {
                value: 8,
                bit_width: 3
            })
        );
    }

    #[test]
    fn test_invalid_bit_width() {
        assert_eq!(pack(&[1], 0), Err(NdtpError::InvalidBitWidth(0)));
        assert_eq!(unpack(&[1], 0, None), Err(NdtpError::InvalidBitWidth(0)));
        assert_eq!(pack(&[1], 33), Err(NdtpError::InvalidBitWidth(33)));
    }

    #[test]
    fn test_unpack_reference_vectors() {
        assert_eq!(unpack(&[0x6C], 2, None).unwrap(), vec![1, 2, 3, 0]);
        assert_eq!(unpack(&[0x6C], 2, Some(3)).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            unpack(&[0x00, 0x70, 0x05, 0x00, 0x30, 0x01], 12, None).unwrap(),
            vec![7, 5, 3, 1]
        );
    }

    #[test]
    fn test_unpack_incomplete_tail() {
        assert_eq!(
            unpack(&[0x01], 3, None),
            Err(NdtpError::IncompleteTrailingValue { remaining_bits: 2 })
        );
    }

    #[test]
    fn test_unpack_count_recovers_odd_tail() {
        // 3 x 12 bits = 36 bits, padded to 5 bytes
        let packed = pack(&[1000, 2000, 3000], 12).unwrap();
        assert_eq!(packed.len(), 5);
        assert!(unpack(&packed, 12, None).is_err());
        assert_eq!(unpack(&packed, 12, Some(3)).unwrap(), vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_unpack_count_too_large() {
        assert_eq!(
            unpack(&[0xFF], 4, Some(3)),
            Err(NdtpError::Truncated {
                needed: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_signed_round_trip() {
        let values = [-2048, -1, 0, 1, 2047];
        let packed = pack_signed(&values, 12).unwrap();
        assert_eq!(unpack_signed(&packed, 12, Some(5)).unwrap(), values);
        assert!(pack_signed(&[2048], 12).is_err());
        assert!(pack_signed(&[-2049], 12).is_err());
    }

    #[test]
    fn test_full_width_values() {
        let values = [u32::MAX, 0, 0xDEAD_BEEF];
        let packed = pack(&values, 32).unwrap();
        assert_eq!(unpack(&packed, 32, None).unwrap(), values);
    }

    proptest! {
        #[test]
        fn prop_pack_unpack_round_trip(
            bit_width in 1u8..=16,
            raw in prop::collection::vec(any::<u32>(), 0..200),
        ) {
            let values: Vec<u32> = raw.iter().map(|v| v & mask(bit_width)).collect();
            let packed = pack(&values, bit_width).unwrap();
            prop_assert_eq!(packed.len(), packed_len(values.len(), bit_width));
            let unpacked = unpack(&packed, bit_width, Some(values.len())).unwrap();
            prop_assert_eq!(unpacked, values);
        }
    }
}

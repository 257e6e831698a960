//! CompactSize variable-length integers.

use crate::ChainError;

/// Append `n` in CompactSize encoding.
pub fn write(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => out.push(n as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Read a CompactSize from the front of `data`, returning the value and the
/// number of bytes it occupied.
pub fn read(data: &[u8]) -> Result<(u64, usize), ChainError> {
    let first = *data.first().ok_or(ChainError::Truncated {
        needed: 1,
        available: 0,
    })?;
    let width = match first {
        0xFD => 2,
        0xFE => 4,
        0xFF => 8,
        n => return Ok((n as u64, 1)),
    };
    let bytes = data.get(1..1 + width).ok_or(ChainError::Truncated {
        needed: 1 + width,
        available: data.len(),
    })?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    Ok((u64::from_le_bytes(buf), 1 + width))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(n: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write(&mut out, n);
        out
    }

    #[test]
    fn width_boundaries() {
        assert_eq!(encoded(0xFC), vec![0xFC]);
        assert_eq!(encoded(0xFD), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(encoded(0x1_0000), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encoded(0x1_0000_0000).len(), 9);
    }

    #[test]
    fn read_back() {
        for n in [0u64, 1, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, u64::MAX] {
            let bytes = encoded(n);
            assert_eq!(read(&bytes).unwrap(), (n, bytes.len()));
        }
    }

    #[test]
    fn truncated_input() {
        assert!(matches!(read(&[]), Err(ChainError::Truncated { .. })));
        assert!(matches!(read(&[0xFE, 1, 2]), Err(ChainError::Truncated { .. })));
    }
}

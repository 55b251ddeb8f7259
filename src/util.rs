use std::convert::TryFrom;
use std::io::{self, BufRead, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use ndarray::ArrayViewMut1;

use crate::error::{Error, Result};

/// Normalize a vector to unit length in place.
///
/// Zero vectors are left untouched. Returns the original l2 norm.
pub fn l2_normalize(mut v: ArrayViewMut1<f32>) -> f32 {
    let norm = v.dot(&v).sqrt();

    if norm != 0. {
        v /= norm;
    }

    norm
}

pub fn read_number(reader: &mut dyn BufRead, delim: u8) -> Result<usize> {
    let field_str = read_string(reader, delim, false)?;
    field_str.trim().parse().map_err(|e| {
        Error::Format(format!(
            "Cannot parse shape component '{}': {}",
            field_str, e
        ))
    })
}

/// Read a string up to (and excluding) `delim`.
pub fn read_string(reader: &mut dyn BufRead, delim: u8, lossy: bool) -> Result<String> {
    let mut buf = Vec::new();
    reader
        .read_until(delim, &mut buf)
        .map_err(|e| Error::read_error("Cannot read string", e))?;

    match buf.pop() {
        Some(last) if last == delim => (),
        Some(last) => buf.push(last),
        None => {
            return Err(Error::Format(String::from(
                "Unexpected end of file while reading string",
            )))
        }
    }

    let s = if lossy {
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        String::from_utf8(buf)
            .map_err(|e| Error::Format(format!("Token contains invalid UTF-8: {}", e)))?
    };

    Ok(s)
}

// Sizes come from file headers, memory grows with the data that is
// actually read.
const READ_CHUNK_LEN: usize = 1 << 16;

/// Read `len` little-endian `f32` values.
pub fn read_f32s<R>(reader: &mut R, len: usize, desc: &str) -> Result<Vec<f32>>
where
    R: Read,
{
    let mut data = Vec::with_capacity(len.min(READ_CHUNK_LEN));
    let mut chunk = vec![0f32; len.min(READ_CHUNK_LEN)];
    while data.len() < len {
        let n = (len - data.len()).min(READ_CHUNK_LEN);
        reader
            .read_f32_into::<LittleEndian>(&mut chunk[..n])
            .map_err(|e| Error::read_error(desc, e))?;
        data.extend_from_slice(&chunk[..n]);
    }

    Ok(data)
}

/// Read `len` bytes.
pub fn read_bytes<R>(reader: &mut R, len: usize, desc: &str) -> Result<Vec<u8>>
where
    R: Read,
{
    let mut data = Vec::with_capacity(len.min(READ_CHUNK_LEN));
    reader
        .take(len as u64)
        .read_to_end(&mut data)
        .map_err(|e| Error::read_error(desc, e))?;

    if data.len() != len {
        return Err(Error::read_error(
            desc,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got: {}", len, data.len()),
            ),
        ));
    }

    Ok(data)
}

/// Convert a size read from a file to `usize`.
pub fn to_usize<T>(n: T, desc: &str) -> Result<usize>
where
    T: Copy + std::fmt::Display,
    usize: TryFrom<T>,
{
    usize::try_from(n).map_err(|_| Error::Format(format!("Invalid {}: {}", desc, n)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ndarray::array;

    use super::{l2_normalize, read_bytes, read_f32s, read_number, read_string, to_usize};
    use crate::error::Error;

    #[test]
    fn l2_normalize_leaves_zero_vector() {
        let mut v = array![0f32, 0., 0.];
        assert_eq!(l2_normalize(v.view_mut()), 0.);
        assert_eq!(v, array![0f32, 0., 0.]);
    }

    #[test]
    fn l2_normalize_unit_length() {
        let mut v = array![3f32, 0., 4.];
        assert_eq!(l2_normalize(v.view_mut()), 5.);
        assert_eq!(v, array![0.6f32, 0., 0.8]);
    }

    #[test]
    fn read_nul_terminated_strings() {
        let mut cursor = Cursor::new(b"hello\0w\xc3\xb6rld\0".to_vec());
        assert_eq!(read_string(&mut cursor, 0, false).unwrap(), "hello");
        assert_eq!(read_string(&mut cursor, 0, false).unwrap(), "wörld");
        assert!(read_string(&mut cursor, 0, false).is_err());
    }

    #[test]
    fn read_string_rejects_invalid_utf8() {
        let mut cursor = Cursor::new(b"zee\xc3n\0".to_vec());
        assert!(read_string(&mut cursor, 0, false).is_err());
        cursor.set_position(0);
        assert_eq!(read_string(&mut cursor, 0, true).unwrap(), "zee\u{fffd}n");
    }

    #[test]
    fn read_shape_numbers() {
        let mut cursor = Cursor::new(b"2 3\n".to_vec());
        assert_eq!(read_number(&mut cursor, b' ').unwrap(), 2);
        assert_eq!(read_number(&mut cursor, b'\n').unwrap(), 3);
    }

    #[test]
    fn negative_sizes_are_rejected() {
        assert!(to_usize(-1i64, "size").is_err());
        assert_eq!(to_usize(5i32, "size").unwrap(), 5);
    }

    #[test]
    fn huge_lengths_fail_on_missing_data() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        assert!(matches!(
            read_f32s(&mut cursor, usize::MAX / 8, "floats"),
            Err(Error::Read { .. })
        ));

        let mut cursor = Cursor::new(vec![0u8; 10]);
        assert!(matches!(
            read_bytes(&mut cursor, usize::MAX / 2, "bytes"),
            Err(Error::Read { .. })
        ));
    }

    #[test]
    fn read_values_spanning_chunks() {
        let len = (1 << 16) + 3;
        let mut data = Vec::new();
        for i in 0..len {
            data.extend_from_slice(&(i as f32).to_le_bytes());
        }

        let values = read_f32s(&mut Cursor::new(&data), len, "floats").unwrap();
        assert_eq!(values.len(), len);
        assert_eq!(values[len - 1], (len - 1) as f32);

        let bytes = read_bytes(&mut Cursor::new(&data), 8, "bytes").unwrap();
        assert_eq!(bytes, &data[..8]);
    }
}

//! Text vector format.
//!
//! The format starts with a line containing the number of vectors and
//! their dimensionality. Every following line contains a word followed
//! by its vector components, separated by spaces:
//!
//! *word component_1 component_2 ... component_n*

use std::io::{BufRead, Write};

use itertools::Itertools;
use ndarray::{Array2, ArrayView1};

use crate::error::{Error, Result};
use crate::util::read_number;

/// Read the *count dims* header.
pub(crate) fn read_header(reader: &mut impl BufRead) -> Result<(usize, usize)> {
    let count = read_number(reader, b' ')?;
    let dims = read_number(reader, b'\n')?;
    Ok((count, dims))
}

/// Read `count` vectors of `dims` components.
pub(crate) fn read_vectors(
    reader: &mut impl BufRead,
    count: usize,
    dims: usize,
) -> Result<(Vec<String>, Array2<f32>)> {
    if count.checked_mul(dims).is_none() {
        return Err(Error::Overflow);
    }

    // The header is not trusted for preallocation.
    let mut words = Vec::new();
    let mut data = Vec::new();

    let mut line = String::new();
    while words.len() < count {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| Error::read_error("Cannot read line from vectors file", e))?;
        if n == 0 {
            return Err(Error::Format(format!(
                "Expected {} vectors, got: {}",
                count,
                words.len()
            )));
        }

        let mut parts = line.split_whitespace();
        let word = match parts.next() {
            Some(word) => word,
            None => continue,
        };

        let start = data.len();
        for part in parts {
            data.push(part.parse().map_err(|e| {
                Error::Format(format!("Cannot parse vector component '{}': {}", part, e))
            })?);
        }

        if data.len() - start != dims {
            return Err(Error::Format(format!(
                "Vector of '{}' has {} components, expected: {}",
                word,
                data.len() - start,
                dims
            )));
        }

        words.push(word.to_owned());
    }

    Ok((words, Array2::from_shape_vec((count, dims), data)?))
}

pub(crate) fn write_header(writer: &mut impl Write, count: usize, dims: usize) -> Result<()> {
    writeln!(writer, "{} {}", count, dims)
        .map_err(|e| Error::write_error("Cannot write vectors header", e))
}

/// Write a word and its vector as a single line.
pub(crate) fn write_vector(
    writer: &mut impl Write,
    word: &str,
    vector: ArrayView1<f32>,
) -> Result<()> {
    let vector_str = vector.iter().map(ToString::to_string).join(" ");
    writeln!(writer, "{} {}", word, vector_str)
        .map_err(|e| Error::write_error("Cannot write word vector", e))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ndarray::array;

    use super::{read_header, read_vectors, write_header, write_vector};
    use crate::error::Error;

    #[test]
    fn read_text_vectors() {
        let mut reader = Cursor::new("2 3\nhallo 1 2 3\n\nwelt -0.5 0 1e-1\n");
        let (count, dims) = read_header(&mut reader).unwrap();
        assert_eq!((count, dims), (2, 3));

        let (words, vectors) = read_vectors(&mut reader, count, dims).unwrap();
        assert_eq!(words, vec!["hallo", "welt"]);
        assert_eq!(vectors, array![[1f32, 2., 3.], [-0.5, 0., 0.1]]);
    }

    #[test]
    fn wrong_number_of_components_fails() {
        let mut reader = Cursor::new("hallo 1 2\n");
        assert!(matches!(
            read_vectors(&mut reader, 1, 3),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn missing_vectors_fail() {
        let mut reader = Cursor::new("hallo 1 2 3\n");
        assert!(matches!(
            read_vectors(&mut reader, 2, 3),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn huge_vector_count_fails_on_missing_vectors() {
        let mut reader = Cursor::new("hallo 1 2 3\n");
        assert!(matches!(
            read_vectors(&mut reader, 1 << 40, 3),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn write_text_vectors() {
        let mut output = Vec::new();
        write_header(&mut output, 1, 3).unwrap();
        write_vector(&mut output, "hallo", array![1f32, -0.5, 0.].view()).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "1 3\nhallo 1 -0.5 0\n");
    }
}

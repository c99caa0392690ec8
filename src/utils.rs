//! Utility functions for files and input.

use std::fs::{self, File};
use std::path::Path;
use std::io::{BufRead, BufReader, Read};

use flate2::read::MultiGzDecoder;

//-----------------------------------------------------------------------------

// Utilities for working with files.

const SIZE_UNITS: [(f64, &str); 6] = [
    (1.0, "B"),
    (1024.0, "KiB"),
    (1024.0 * 1024.0, "MiB"),
    (1024.0 * 1024.0 * 1024.0, "GiB"),
    (1024.0 * 1024.0 * 1024.0 * 1024.0, "TiB"),
    (1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0, "PiB"),
];

/// Returns a human-readable representation of the given number of bytes.
pub fn human_readable_size(bytes: usize) -> String {
    let mut unit = 0;
    let value = bytes as f64;
    while unit + 1 < SIZE_UNITS.len() && value >= SIZE_UNITS[unit + 1].0 {
        unit += 1;
    }
    format!("{:.3} {}", value / SIZE_UNITS[unit].0, SIZE_UNITS[unit].1)
}

/// Returns a human-readable size of the file, or [`None`] if the file cannot be accessed.
pub fn file_size<P: AsRef<Path>>(filename: P) -> Option<String> {
    let metadata = fs::metadata(filename).ok()?;
    Some(human_readable_size(metadata.len() as usize))
}

/// Returns `true` if the file exists.
pub fn file_exists<P: AsRef<Path>>(filename: P) -> bool {
    fs::metadata(filename).is_ok()
}

/// Returns `true` if the file appears to be gzip-compressed.
pub fn is_gzipped<P: AsRef<Path>>(filename: P) -> bool {
    let file = match File::open(filename) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut reader = BufReader::new(file);
    let mut magic = [0; 2];
    let len = reader.read(&mut magic).ok();
    len == Some(2) && magic == [0x1F, 0x8B]
}

/// Returns a buffered reader for the file, which may be gzip-compressed.
pub fn open_file<P: AsRef<Path>>(filename: P) -> Result<Box<dyn BufRead>, String> {
    let file = File::open(&filename).map_err(|x| format!("{}: {}", filename.as_ref().display(), x))?;
    let inner = BufReader::new(file);
    if is_gzipped(&filename) {
        let inner = MultiGzDecoder::new(inner);
        Ok(Box::new(BufReader::new(inner)))
    } else {
        Ok(Box::new(inner))
    }
}

//-----------------------------------------------------------------------------

// Utilities for command line arguments.

/// Parses a colour list such as `0,6-8` into colours `[0, 6, 7, 8]`.
///
/// Colours are listed in the given order, and ranges are inclusive.
/// Returns an error if the list is empty or malformed.
pub fn parse_colour_list(list: &str) -> Result<Vec<usize>, String> {
    let mut result = Vec::new();
    for item in list.split(',') {
        let parse = |value: &str| -> Result<usize, String> {
            value.parse::<usize>().map_err(|x| format!("Invalid colour {} in list {}: {}", value, list, x))
        };
        match item.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(format!("Invalid colour range {} in list {}", item, list));
                }
                result.extend(start..=end);
            },
            None => result.push(parse(item)?),
        }
    }
    Ok(result)
}

/// Splits a graph argument `FILE[:COLS]` into the file name and the optional colour list.
///
/// The suffix after the last `:` is treated as a colour list only if it consists of digits, commas, and dashes.
/// Returns an error if the colour list is malformed.
pub fn parse_graph_arg(arg: &str) -> Result<(&str, Option<Vec<usize>>), String> {
    if let Some((filename, list)) = arg.rsplit_once(':') {
        if !list.is_empty() && list.bytes().all(|c| c.is_ascii_digit() || c == b',' || c == b'-') {
            return Ok((filename, Some(parse_colour_list(list)?)));
        }
    }
    Ok((arg, None))
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------

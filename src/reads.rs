//! Sequencing reads and a minimal FASTA/FASTQ reader.
//!
//! The reader detects the format from the first character of each record: `>` starts a FASTA record and `@` a FASTQ record.
//! FASTA sequences may span multiple lines.
//! FASTQ records must have the sequence and the qualities on a single line each.
//! Files may be gzip-compressed; see [`utils::open_file`].

use crate::utils;

use std::io::BufRead;
use std::path::Path;


//-----------------------------------------------------------------------------

/// A sequencing read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Read {
    /// Read name without the leading `>` or `@`.
    pub name: String,
    /// Sequence as bytes.
    pub seq: Vec<u8>,
    /// Quality values as raw bytes, or an empty vector if there are none.
    pub qual: Vec<u8>,
}

impl Read {
    /// Creates a read without quality values.
    pub fn new(name: &str, seq: &[u8]) -> Self {
        Read {
            name: String::from(name),
            seq: seq.to_vec(),
            qual: Vec::new(),
        }
    }

    /// Creates a read with quality values.
    pub fn with_quality(name: &str, seq: &[u8], qual: &[u8]) -> Self {
        Read {
            name: String::from(name),
            seq: seq.to_vec(),
            qual: qual.to_vec(),
        }
    }

    /// Returns the length of the read.
    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns `true` if the read is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Returns `true` if the read has a quality value for each base.
    #[inline]
    pub fn has_quality(&self) -> bool {
        !self.qual.is_empty() && self.qual.len() == self.seq.len()
    }
}

//-----------------------------------------------------------------------------

/// A reader for FASTA and FASTQ files.
///
/// The reader is an iterator over `Result<`[`Read`]`, String>`.
///
/// # Examples
///
/// ```
/// use ctx_graph::reads::SequenceReader;
/// use std::io::BufReader;
///
/// let data = b">first\nGATT\nACA\n@second\nCAT\n+\nIII\n";
/// let reader = SequenceReader::new(BufReader::new(&data[..]));
/// let reads: Vec<_> = reader.map(|read| read.unwrap()).collect();
/// assert_eq!(reads.len(), 2);
/// assert_eq!(reads[0].seq, b"GATTACA");
/// assert_eq!(reads[1].name, "second");
/// assert_eq!(reads[1].qual, b"III");
/// ```
pub struct SequenceReader<R: BufRead> {
    reader: R,
    // The next header line, if it has already been read.
    header: Option<Vec<u8>>,
    line_num: usize,
    finished: bool,
}

impl SequenceReader<Box<dyn BufRead>> {
    /// Opens the file for reading.
    ///
    /// The file may be gzip-compressed.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self, String> {
        let reader = utils::open_file(filename)?;
        Ok(SequenceReader::new(reader))
    }
}

impl<R: BufRead> SequenceReader<R> {
    /// Creates a new reader.
    pub fn new(reader: R) -> Self {
        SequenceReader {
            reader,
            header: None,
            line_num: 0,
            finished: false,
        }
    }

    // Reads the next line without the line terminator.
    // Returns `None` at the end of the input.
    fn next_line(&mut self) -> Result<Option<Vec<u8>>, String> {
        let mut buf: Vec<u8> = Vec::new();
        let len = self.reader.read_until(b'\n', &mut buf).map_err(|x| x.to_string())?;
        if len == 0 {
            return Ok(None);
        }
        self.line_num += 1;
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    // Returns the next non-empty line.
    fn next_nonempty_line(&mut self) -> Result<Option<Vec<u8>>, String> {
        while let Some(line) = self.next_line()? {
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn parse_name(header: &[u8]) -> String {
        String::from_utf8_lossy(&header[1..]).into_owned()
    }

    /// Returns the next read, or [`None`] if there are no more reads.
    pub fn read_next(&mut self) -> Result<Option<Read>, String> {
        let header = match self.header.take() {
            Some(header) => header,
            None => match self.next_nonempty_line()? {
                Some(line) => line,
                None => return Ok(None),
            },
        };

        match header[0] {
            b'>' => self.read_fasta(&header).map(Some),
            b'@' => self.read_fastq(&header).map(Some),
            _ => Err(format!("Line {}: Expected a FASTA or FASTQ header", self.line_num)),
        }
    }

    fn read_fasta(&mut self, header: &[u8]) -> Result<Read, String> {
        let mut result = Read { name: Self::parse_name(header), ..Read::default() };
        while let Some(line) = self.next_line()? {
            if line.first() == Some(&b'>') || line.first() == Some(&b'@') {
                self.header = Some(line);
                break;
            }
            result.seq.extend_from_slice(&line);
        }
        Ok(result)
    }

    fn read_fastq(&mut self, header: &[u8]) -> Result<Read, String> {
        let name = Self::parse_name(header);
        let seq = self.next_line()?.ok_or(format!("Line {}: Missing sequence for read {}", self.line_num, name))?;
        let separator = self.next_line()?.ok_or(format!("Line {}: Missing separator for read {}", self.line_num, name))?;
        if separator.first() != Some(&b'+') {
            return Err(format!("Line {}: Expected a FASTQ separator line for read {}", self.line_num, name));
        }
        let qual = self.next_line()?.ok_or(format!("Line {}: Missing qualities for read {}", self.line_num, name))?;
        if qual.len() != seq.len() {
            return Err(format!(
                "Line {}: Read {} has {} bases but {} quality values",
                self.line_num, name, seq.len(), qual.len()
            ));
        }
        Ok(Read { name, seq, qual })
    }
}

impl<R: BufRead> Iterator for SequenceReader<R> {
    type Item = Result<Read, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(read)) => Some(Ok(read)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(message) => {
                self.finished = true;
                Some(Err(message))
            },
        }
    }
}

//-----------------------------------------------------------------------------

//! Segmentation of reads into clean contigs.
//!
//! A base is clean if:
//!
//! * it is one of `acgtACGT`;
//! * its quality value is at least the quality cutoff (when the cutoff is nonzero and the read has qualities);
//! * it is not part of a homopolymer run of at least the homopolymer cutoff bases (when the cutoff is nonzero).
//!
//! A clean contig is a maximal run of clean bases of length at least `kmer_size`.

use crate::kmer;
use crate::reads::Read;

use std::ops::Range;


//-----------------------------------------------------------------------------

/// An iterator over the clean contigs of a read, from left to right.
///
/// The contigs are non-overlapping ranges of offsets in the read.
/// The type of `Item` is [`Range<usize>`].
///
/// # Examples
///
/// ```
/// use ctx_graph::contigs::ContigIter;
/// use ctx_graph::reads::Read;
///
/// let read = Read::with_quality("read", b"GATTACANNCATTACAGAAAAAAT", b"IIIIIIIIIIIIII#IIIIIIIII");
/// let contigs: Vec<_> = ContigIter::new(&read, 2, b'+', 5).collect();
/// assert_eq!(contigs, vec![0..7, 9..14, 15..17]);
/// ```
#[derive(Clone, Debug)]
pub struct ContigIter {
    clean: Vec<bool>,
    kmer_size: usize,
    pos: usize,
}

impl ContigIter {
    /// Creates a new iterator.
    ///
    /// # Arguments
    ///
    /// * `read`: The read to segment.
    /// * `kmer_size`: Minimum length of a contig.
    /// * `qcutoff`: Minimum quality value as a raw byte, or 0 to ignore qualities.
    /// * `hp_cutoff`: Homopolymer runs of at least this length are excluded, or 0 to keep all runs.
    pub fn new(read: &Read, kmer_size: usize, qcutoff: u8, hp_cutoff: usize) -> Self {
        let use_quality = qcutoff > 0 && read.has_quality();
        let mut clean: Vec<bool> = read.seq.iter().enumerate().map(|(i, &base)| {
            kmer::is_acgt(base) && (!use_quality || read.qual[i] >= qcutoff)
        }).collect();

        if hp_cutoff > 0 {
            let mut start = 0;
            while start < read.seq.len() {
                let mut end = start + 1;
                while end < read.seq.len() && read.seq[end].eq_ignore_ascii_case(&read.seq[start]) {
                    end += 1;
                }
                if end - start >= hp_cutoff {
                    clean[start..end].iter_mut().for_each(|value| *value = false);
                }
                start = end;
            }
        }

        ContigIter {
            clean,
            kmer_size: kmer_size.max(1),
            pos: 0,
        }
    }

    /// Restarts the iteration from the beginning of the read.
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for ContigIter {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.clean.len();
        while self.pos < len {
            while self.pos < len && !self.clean[self.pos] {
                self.pos += 1;
            }
            let start = self.pos;
            while self.pos < len && self.clean[self.pos] {
                self.pos += 1;
            }
            if self.pos - start >= self.kmer_size {
                return Some(start..self.pos);
            }
        }
        None
    }
}

//-----------------------------------------------------------------------------

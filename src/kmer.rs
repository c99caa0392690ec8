//! Packed k-mers and canonical keys.
//!
//! A [`BinaryKmer`] stores a DNA string of length `kmer_size` using two bits per base.
//! The first base of the string is the most significant one.
//! The k-mer itself does not know its length; every operation that depends on it takes `kmer_size` as an argument.
//!
//! Nucleotides are encoded as `A = 0`, `C = 1`, `G = 2`, `T = 3`, so that the complement of `n` is `3 - n`.
//! With this encoding, the numerical order of two k-mers of the same length is the lexicographic order of the strings.

use gbz::Orientation;

use std::fmt;


//-----------------------------------------------------------------------------

/// A nucleotide encoded as a value in `0..4`.
pub type Nucleotide = u8;

/// Number of 64-bit words in a [`BinaryKmer`].
pub const NUM_BKMER_WORDS: usize = 2;

/// Maximum supported k-mer size.
pub const MAX_KMER_SIZE: usize = 32 * NUM_BKMER_WORDS - 1;

const NUC_TO_CHAR: [u8; 4] = [b'A', b'C', b'G', b'T'];

const fn generate_encoding() -> [u8; 256] {
    let mut result = [4; 256];
    result[b'a' as usize] = 0; result[b'A' as usize] = 0;
    result[b'c' as usize] = 1; result[b'C' as usize] = 1;
    result[b'g' as usize] = 2; result[b'G' as usize] = 2;
    result[b't' as usize] = 3; result[b'T' as usize] = 3;
    result
}

const CHAR_TO_NUC: [u8; 256] = generate_encoding();

/// Encodes a base as a nucleotide, or returns [`None`] if the base is not in `acgtACGT`.
#[inline]
pub fn encode_base(base: u8) -> Option<Nucleotide> {
    let nuc = CHAR_TO_NUC[base as usize];
    if nuc < 4 { Some(nuc) } else { None }
}

/// Decodes a nucleotide as an uppercase base.
#[inline]
pub fn decode_base(nuc: Nucleotide) -> u8 {
    NUC_TO_CHAR[(nuc & 3) as usize]
}

/// Returns `true` if the base is in `acgtACGT`.
#[inline]
pub fn is_acgt(base: u8) -> bool {
    CHAR_TO_NUC[base as usize] < 4
}

/// Returns the complement of the nucleotide.
#[inline]
pub fn complement(nuc: Nucleotide) -> Nucleotide {
    3 - (nuc & 3)
}

/// Returns the opposite orientation.
#[inline]
pub fn flip(orientation: Orientation) -> Orientation {
    match orientation {
        Orientation::Forward => Orientation::Reverse,
        Orientation::Reverse => Orientation::Forward,
    }
}

//-----------------------------------------------------------------------------

/// A k-mer packed into [`NUM_BKMER_WORDS`] words.
///
/// Word 0 is the most significant word, and the bits above `2 * kmer_size` are always zero.
/// Comparisons between k-mers of the same length follow the lexicographic order of the sequences.
///
/// # Examples
///
/// ```
/// use ctx_graph::kmer::{BinaryKmer, Nucleotide};
/// use gbz::Orientation;
///
/// let k = 5;
/// let kmer = BinaryKmer::from_bases(b"TTACG", k);
/// assert_eq!(kmer.to_string(k), "TTACG");
///
/// // The reverse complement is smaller, so it is the key.
/// let key = kmer.get_key(k);
/// assert_eq!(key.to_string(k), "CGTAA");
/// assert_eq!(BinaryKmer::orientation(&kmer, &key), Orientation::Reverse);
///
/// // Extend the k-mer with a T.
/// let next = kmer.left_shift_add(k, 3 as Nucleotide);
/// assert_eq!(next.to_string(k), "TACGT");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinaryKmer {
    words: [u64; NUM_BKMER_WORDS],
}

impl BinaryKmer {
    /// Builds a k-mer from the first `kmer_size` bases of the sequence.
    ///
    /// # Panics
    ///
    /// Will panic if `kmer_size` is not in `1..=MAX_KMER_SIZE`, if the sequence is too short, or if it contains bases outside `acgtACGT`.
    pub fn from_bases(sequence: &[u8], kmer_size: usize) -> Self {
        assert!(kmer_size > 0 && kmer_size <= MAX_KMER_SIZE, "Invalid k-mer size {}", kmer_size);
        assert!(sequence.len() >= kmer_size, "Sequence of length {} is shorter than k-mer size {}", sequence.len(), kmer_size);
        let mut result = BinaryKmer::default();
        for &base in sequence[..kmer_size].iter() {
            let nuc = encode_base(base).unwrap_or_else(|| panic!("Invalid base in a k-mer: {}", base as char));
            result = result.left_shift_add(kmer_size, nuc);
        }
        result
    }

    /// Returns the sequence of the k-mer as uppercase bases.
    pub fn to_bases(&self, kmer_size: usize) -> Vec<u8> {
        (0..kmer_size).map(|i| decode_base(self.nuc_at(kmer_size, i))).collect()
    }

    /// Returns the sequence of the k-mer as a string.
    pub fn to_string(&self, kmer_size: usize) -> String {
        // Only ACGT can appear in the output.
        self.to_bases(kmer_size).into_iter().map(char::from).collect()
    }

    /// Returns a wrapper that displays the k-mer as a string.
    pub fn display(&self, kmer_size: usize) -> KmerDisplay {
        KmerDisplay { kmer: *self, kmer_size }
    }

    /// Returns the raw words of the k-mer, most significant first.
    #[inline]
    pub fn words(&self) -> &[u64; NUM_BKMER_WORDS] {
        &self.words
    }

    /// Builds a k-mer from raw words.
    ///
    /// Bits above `2 * kmer_size` are cleared.
    pub fn from_words(words: [u64; NUM_BKMER_WORDS], kmer_size: usize) -> Self {
        BinaryKmer { words }.masked(kmer_size)
    }

    // Clears the bits above `2 * kmer_size`.
    fn masked(mut self, kmer_size: usize) -> Self {
        let used_bits = 2 * kmer_size;
        for (i, word) in self.words.iter_mut().enumerate() {
            let low = 64 * (NUM_BKMER_WORDS - 1 - i);
            if used_bits <= low {
                *word = 0;
            } else if used_bits - low < 64 {
                *word &= (1u64 << (used_bits - low)) - 1;
            }
        }
        self
    }

    /// Returns the nucleotide at position `offset` of the k-mer.
    #[inline]
    pub fn nuc_at(&self, kmer_size: usize, offset: usize) -> Nucleotide {
        let bit = 2 * (kmer_size - 1 - offset);
        let word = NUM_BKMER_WORDS - 1 - bit / 64;
        ((self.words[word] >> (bit % 64)) & 3) as Nucleotide
    }

    /// Returns the first nucleotide of the k-mer.
    #[inline]
    pub fn first_nuc(&self, kmer_size: usize) -> Nucleotide {
        self.nuc_at(kmer_size, 0)
    }

    /// Returns the last nucleotide of the k-mer.
    #[inline]
    pub fn last_nuc(&self) -> Nucleotide {
        (self.words[NUM_BKMER_WORDS - 1] & 3) as Nucleotide
    }

    /// Drops the first base and appends `nuc` as the last base.
    pub fn left_shift_add(&self, kmer_size: usize, nuc: Nucleotide) -> Self {
        let mut words = self.words;
        for i in 0..NUM_BKMER_WORDS - 1 {
            words[i] = (words[i] << 2) | (words[i + 1] >> 62);
        }
        words[NUM_BKMER_WORDS - 1] = (words[NUM_BKMER_WORDS - 1] << 2) | (nuc & 3) as u64;
        BinaryKmer { words }.masked(kmer_size)
    }

    /// Drops the last base, leaving the first position empty (`A`).
    pub fn right_shift_one_base(&self) -> Self {
        let mut words = self.words;
        for i in (1..NUM_BKMER_WORDS).rev() {
            words[i] = (words[i] >> 2) | (words[i - 1] << 62);
        }
        words[0] >>= 2;
        BinaryKmer { words }
    }

    /// Returns the reverse complement of the k-mer.
    pub fn reverse_complement(&self, kmer_size: usize) -> Self {
        let mut source = *self;
        let mut result = BinaryKmer::default();
        for _ in 0..kmer_size {
            result = result.left_shift_add(kmer_size, complement(source.last_nuc()));
            source = source.right_shift_one_base();
        }
        result
    }

    /// Returns the canonical key of the k-mer: the smaller of the k-mer and its reverse complement.
    ///
    /// Comparing the first base to the complement of the last base decides three cases out of four.
    /// The full comparison is only needed when they are equal.
    pub fn get_key(&self, kmer_size: usize) -> Self {
        let first = self.first_nuc(kmer_size);
        let rev_last = complement(self.last_nuc());
        if first < rev_last {
            return *self;
        }
        let rc = self.reverse_complement(kmer_size);
        if first > rev_last {
            return rc;
        }
        if *self < rc { *self } else { rc }
    }

    /// Returns the orientation of the k-mer relative to its canonical key.
    #[inline]
    pub fn orientation(kmer: &BinaryKmer, key: &BinaryKmer) -> Orientation {
        if kmer == key { Orientation::Forward } else { Orientation::Reverse }
    }

    /// Returns the k-mer in the given orientation.
    #[inline]
    pub fn oriented(&self, kmer_size: usize, orientation: Orientation) -> Self {
        match orientation {
            Orientation::Forward => *self,
            Orientation::Reverse => self.reverse_complement(kmer_size),
        }
    }
}

//-----------------------------------------------------------------------------

/// A [`BinaryKmer`] together with its length, for use with formatting macros.
#[derive(Clone, Copy, Debug)]
pub struct KmerDisplay {
    kmer: BinaryKmer,
    kmer_size: usize,
}

impl fmt::Display for KmerDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.kmer_size {
            write!(f, "{}", decode_base(self.kmer.nuc_at(self.kmer_size, i)) as char)?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

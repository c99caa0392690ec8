//! An append-only store of packed paths.
//!
//! Paths are stored as variable-length records in a single byte arena.
//! Each node handle owns a singly linked list of records, newest first, linked through the `prev` field.
//! Records are never modified or removed after they have been appended.
//!
//! # Record layout
//!
//! All integers are little-endian.
//!
//! | Field | Size | Contents |
//! |---|---|---|
//! | `prev` | 8 bytes | Offset of the previous record for the same node, or [`PATH_NULL`] |
//! | `colset` | [`PathStore::colset_bytes`] | Colours using the path; colour `c` is bit `c % 8` of byte `c / 8` |
//! | `len_orient` | 4 bytes | Path length in bases; the highest bit is the orientation of the start node |
//! | `bases` | `ceil(len / 4)` bytes | Four bases per byte; base `i` is in bits `2 * (i % 4)..` of byte `i / 4` |
//!
//! The path starts from the node owning the list, in the stored orientation.
//! The bases are the choices made at each fork when walking the graph from the start node.

use crate::graph::NodeHandle;
use crate::kmer::Nucleotide;

use gbz::Orientation;


//-----------------------------------------------------------------------------

/// Offset of a record in the path store.
pub type PathIndex = u64;

/// Marker for a missing record.
pub const PATH_NULL: PathIndex = PathIndex::MAX;

/// Maximum path length in bases.
pub const MAX_PATH_LEN: usize = (1 << 31) - 1;

const PREV_BYTES: usize = 8;
const LEN_BYTES: usize = 4;
const ORIENT_BIT: u32 = 1 << 31;

/// Packs nucleotides into bytes, four per byte.
pub fn pack_bases(bases: &[Nucleotide]) -> Vec<u8> {
    let mut result = vec![0u8; packed_len(bases.len())];
    for (i, &nuc) in bases.iter().enumerate() {
        result[i / 4] |= (nuc & 3) << (2 * (i % 4));
    }
    result
}

/// Unpacks `len` nucleotides from packed bytes.
///
/// # Panics
///
/// Will panic if there are not enough bytes.
pub fn unpack_bases(packed: &[u8], len: usize) -> Vec<Nucleotide> {
    (0..len).map(|i| (packed[i / 4] >> (2 * (i % 4))) & 3).collect()
}

/// Returns the number of bytes needed for `len` packed bases.
#[inline]
pub fn packed_len(len: usize) -> usize {
    len.div_ceil(4)
}

//-----------------------------------------------------------------------------

/// A parsed path record borrowing from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathRecord<'a> {
    index: PathIndex,
    prev: PathIndex,
    colset: &'a [u8],
    len: usize,
    orient: Orientation,
    packed: &'a [u8],
}

impl<'a> PathRecord<'a> {
    /// Returns the offset of the record in the store.
    #[inline]
    pub fn index(&self) -> PathIndex {
        self.index
    }

    /// Returns the offset of the previous record for the same node, or [`None`] if this is the oldest one.
    #[inline]
    pub fn prev(&self) -> Option<PathIndex> {
        if self.prev == PATH_NULL { None } else { Some(self.prev) }
    }

    /// Returns the colour set as raw bytes.
    #[inline]
    pub fn colset(&self) -> &'a [u8] {
        self.colset
    }

    /// Returns `true` if the colour uses this path.
    #[inline]
    pub fn has_colour(&self, colour: usize) -> bool {
        let byte = colour / 8;
        byte < self.colset.len() && self.colset[byte] & (1 << (colour % 8)) != 0
    }

    /// Returns `true` if no colour uses this path.
    pub fn colset_is_empty(&self) -> bool {
        self.colset.iter().all(|&byte| byte == 0)
    }

    /// Returns the colours using this path in increasing order.
    pub fn colours(&self) -> Vec<usize> {
        (0..8 * self.colset.len()).filter(|&colour| self.has_colour(colour)).collect()
    }

    /// Returns the length of the path in bases.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the path has no bases.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the orientation of the start node.
    #[inline]
    pub fn orient(&self) -> Orientation {
        self.orient
    }

    /// Returns the packed bases.
    #[inline]
    pub fn packed(&self) -> &'a [u8] {
        self.packed
    }

    /// Returns the bases of the path.
    pub fn bases(&self) -> Vec<Nucleotide> {
        unpack_bases(self.packed(), self.len)
    }

    /// Returns the total size of the record in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        PREV_BYTES + self.colset.len() + LEN_BYTES + self.packed.len()
    }
}

//-----------------------------------------------------------------------------

/// An append-only store of packed paths for the nodes of a graph.
///
/// The store keeps track of the total number of paths and the number of nodes with at least one path.
/// [`crate::DeBruijnGraph::check_all_paths`] verifies these counters against the records.
///
/// # Examples
///
/// ```
/// use ctx_graph::path_store::PathStore;
/// use gbz::Orientation;
///
/// let mut store = PathStore::new(3);
/// let first = store.add_path(7, Orientation::Forward, &[0, 2], &[1, 3, 0]).unwrap();
/// let second = store.add_path(7, Orientation::Reverse, &[1], &[2]).unwrap();
/// assert_eq!(store.num_of_paths(), 2);
/// assert_eq!(store.num_kmers_with_paths(), 1);
///
/// // The list is newest first.
/// let records: Vec<_> = store.paths(7).map(|record| record.unwrap()).collect();
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].index(), second);
/// assert_eq!(records[1].index(), first);
/// assert_eq!(records[1].colours(), vec![0, 2]);
/// assert_eq!(records[1].bases(), vec![1, 3, 0]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStore {
    num_of_cols: usize,
    colset_bytes: usize,
    store: Vec<u8>,
    // List head for each handle; handles past the end have no paths.
    kmer_paths: Vec<PathIndex>,
    num_of_paths: usize,
    num_kmers_with_paths: usize,
}

impl PathStore {
    /// Creates an empty store for the given number of colours.
    pub fn new(num_of_cols: usize) -> Self {
        PathStore {
            num_of_cols,
            colset_bytes: Self::colset_bytes_for(num_of_cols),
            store: Vec::new(),
            kmer_paths: Vec::new(),
            num_of_paths: 0,
            num_kmers_with_paths: 0,
        }
    }

    /// Creates a store from its raw components.
    ///
    /// The records are not parsed, and the counters are taken as given.
    /// Use [`crate::DeBruijnGraph::check_all_paths`] to validate the result.
    pub fn from_parts(
        num_of_cols: usize, store: Vec<u8>, kmer_paths: Vec<PathIndex>,
        num_of_paths: usize, num_kmers_with_paths: usize
    ) -> Self {
        PathStore {
            num_of_cols,
            colset_bytes: Self::colset_bytes_for(num_of_cols),
            store, kmer_paths,
            num_of_paths, num_kmers_with_paths,
        }
    }

    fn colset_bytes_for(num_of_cols: usize) -> usize {
        num_of_cols.div_ceil(8).max(1)
    }

    /// Returns the number of colours.
    #[inline]
    pub fn num_of_cols(&self) -> usize {
        self.num_of_cols
    }

    /// Returns the size of a colour set in bytes.
    #[inline]
    pub fn colset_bytes(&self) -> usize {
        self.colset_bytes
    }

    /// Returns the arena as a byte slice.
    #[inline]
    pub fn arena(&self) -> &[u8] {
        &self.store
    }

    /// Returns the end offset of the arena.
    #[inline]
    pub fn end(&self) -> usize {
        self.store.len()
    }

    /// Returns the list heads indexed by node handle.
    #[inline]
    pub fn heads(&self) -> &[PathIndex] {
        &self.kmer_paths
    }

    /// Returns the number of stored paths.
    #[inline]
    pub fn num_of_paths(&self) -> usize {
        self.num_of_paths
    }

    /// Returns the number of nodes with at least one path.
    #[inline]
    pub fn num_kmers_with_paths(&self) -> usize {
        self.num_kmers_with_paths
    }

    /// Returns the offset of the newest record for the node, or [`None`] if the node has no paths.
    #[inline]
    pub fn head(&self, handle: NodeHandle) -> Option<PathIndex> {
        match self.kmer_paths.get(handle) {
            Some(&index) if index != PATH_NULL => Some(index),
            _ => None,
        }
    }

    /// Appends a path starting from the node and makes it the newest path of the node.
    ///
    /// Returns the offset of the new record.
    /// Returns an error if the colour set is empty, a colour is out of range, the path is too long, or a base is invalid.
    pub fn add_path(&mut self, handle: NodeHandle, orient: Orientation, colours: &[usize], bases: &[Nucleotide]) -> Result<PathIndex, String> {
        if colours.is_empty() {
            return Err(format!("Path for node {} has an empty colour set", handle));
        }
        let mut colset = vec![0u8; self.colset_bytes];
        for &colour in colours {
            if colour >= self.num_of_cols {
                return Err(format!("Colour {} is out of range (the store has {} colours)", colour, self.num_of_cols));
            }
            colset[colour / 8] |= 1 << (colour % 8);
        }
        if bases.len() > MAX_PATH_LEN {
            return Err(format!("Path of length {} is too long", bases.len()));
        }
        if let Some(base) = bases.iter().find(|&&nuc| nuc > 3) {
            return Err(format!("Invalid base {} in a path for node {}", base, handle));
        }

        let index = self.store.len() as PathIndex;
        let prev = self.head(handle).unwrap_or(PATH_NULL);
        let len_orient = match orient {
            Orientation::Forward => bases.len() as u32,
            Orientation::Reverse => bases.len() as u32 | ORIENT_BIT,
        };
        self.store.extend_from_slice(&prev.to_le_bytes());
        self.store.extend_from_slice(&colset);
        self.store.extend_from_slice(&len_orient.to_le_bytes());
        self.store.extend_from_slice(&pack_bases(bases));

        if handle >= self.kmer_paths.len() {
            self.kmer_paths.resize(handle + 1, PATH_NULL);
        }
        self.kmer_paths[handle] = index;
        self.num_of_paths += 1;
        if prev == PATH_NULL {
            self.num_kmers_with_paths += 1;
        }
        Ok(index)
    }

    /// Parses the record at the given offset.
    ///
    /// Returns an error if any part of the record would lie past the end of the arena.
    pub fn record(&self, index: PathIndex) -> Result<PathRecord<'_>, String> {
        let start = usize::try_from(index).map_err(|x| x.to_string())?;
        let header = PREV_BYTES + self.colset_bytes + LEN_BYTES;
        let header_end = start.checked_add(header).ok_or(format!("Path record offset {} overflows", index))?;
        if header_end > self.store.len() {
            return Err(format!("Path record header at {} extends past the end of the store ({} > {})", index, header_end, self.store.len()));
        }

        let mut prev_bytes = [0u8; PREV_BYTES];
        prev_bytes.copy_from_slice(&self.store[start..start + PREV_BYTES]);
        let prev = PathIndex::from_le_bytes(prev_bytes);
        let colset_start = start + PREV_BYTES;
        let colset = &self.store[colset_start..colset_start + self.colset_bytes];
        let mut len_bytes = [0u8; LEN_BYTES];
        len_bytes.copy_from_slice(&self.store[header_end - LEN_BYTES..header_end]);
        let len_orient = u32::from_le_bytes(len_bytes);
        let orient = if len_orient & ORIENT_BIT != 0 { Orientation::Reverse } else { Orientation::Forward };
        let len = (len_orient & !ORIENT_BIT) as usize;

        let end = header_end + packed_len(len);
        if end > self.store.len() {
            return Err(format!("Path record at {} extends past the end of the store ({} > {})", index, end, self.store.len()));
        }
        Ok(PathRecord {
            index, prev, colset, len, orient,
            packed: &self.store[header_end..end],
        })
    }

    /// Returns an iterator over the paths of the node, newest first.
    ///
    /// The iterator stops after the first record that cannot be parsed.
    pub fn paths(&self, handle: NodeHandle) -> PathIter<'_> {
        PathIter {
            store: self,
            next: self.head(handle).unwrap_or(PATH_NULL),
        }
    }
}

//-----------------------------------------------------------------------------

/// An iterator over the paths of a node.
///
/// The type of `Item` is `Result<`[`PathRecord`]`, String>`.
#[derive(Clone, Debug)]
pub struct PathIter<'a> {
    store: &'a PathStore,
    next: PathIndex,
}

impl<'a> Iterator for PathIter<'a> {
    type Item = Result<PathRecord<'a>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == PATH_NULL {
            return None;
        }
        match self.store.record(self.next) {
            Ok(record) => {
                self.next = record.prev;
                Some(Ok(record))
            },
            Err(message) => {
                self.next = PATH_NULL;
                Some(Err(message))
            },
        }
    }
}

//-----------------------------------------------------------------------------

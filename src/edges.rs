//! Edge bytes and saturating coverage counters.
//!
//! An [`Edges`] byte stores the edges of a single node in a single colour (or in the merged edge track).
//! Bits 0 to 3 are the outgoing bases `A`, `C`, `G`, `T` when the node is read in forward orientation.
//! Bits 4 to 7 are the outgoing bases when the node is read in reverse orientation.
//! An outgoing base `n` in reverse orientation corresponds to an incoming base `complement(n)` in forward orientation.
//!
//! Coverage is a [`Covg`] counter that saturates at [`COVG_MAX`] instead of wrapping around.

use crate::kmer::{self, Nucleotide};

use gbz::Orientation;

use std::sync::atomic::{AtomicU32, Ordering};


//-----------------------------------------------------------------------------

/// Edges of a node in one colour.
pub type Edges = u8;

/// Returns the edges in the given orientation as a 4-bit value.
#[inline]
pub fn with_orientation(edges: Edges, orientation: Orientation) -> Edges {
    match orientation {
        Orientation::Forward => edges & 0x0F,
        Orientation::Reverse => edges >> 4,
    }
}

/// Clears the edges that do not belong to the given orientation.
#[inline]
pub fn mask_orientation(edges: Edges, orientation: Orientation) -> Edges {
    match orientation {
        Orientation::Forward => edges & 0x0F,
        Orientation::Reverse => edges & 0xF0,
    }
}

#[inline]
fn edge_bit(nuc: Nucleotide, orientation: Orientation) -> Edges {
    let shift = match orientation {
        Orientation::Forward => 0,
        Orientation::Reverse => 4,
    };
    1 << ((nuc & 3) + shift)
}

/// Adds an outgoing edge with base `nuc` in the given orientation.
#[inline]
pub fn set_edge(edges: Edges, nuc: Nucleotide, orientation: Orientation) -> Edges {
    edges | edge_bit(nuc, orientation)
}

/// Removes the outgoing edge with base `nuc` in the given orientation.
#[inline]
pub fn del_edge(edges: Edges, nuc: Nucleotide, orientation: Orientation) -> Edges {
    edges & !edge_bit(nuc, orientation)
}

/// Returns `true` if there is an outgoing edge with base `nuc` in the given orientation.
#[inline]
pub fn has_edge(edges: Edges, nuc: Nucleotide, orientation: Orientation) -> bool {
    edges & edge_bit(nuc, orientation) != 0
}

/// Returns the number of outgoing edges in the given orientation.
#[inline]
pub fn outdegree(edges: Edges, orientation: Orientation) -> usize {
    with_orientation(edges, orientation).count_ones() as usize
}

/// Returns the number of incoming edges in the given orientation.
#[inline]
pub fn indegree(edges: Edges, orientation: Orientation) -> usize {
    outdegree(edges, kmer::flip(orientation))
}

/// Returns the base of the only outgoing edge in the given orientation.
///
/// Returns [`None`] if there are no outgoing edges or more than one of them.
#[inline]
pub fn has_precisely_one_edge(edges: Edges, orientation: Orientation) -> Option<Nucleotide> {
    let edges = with_orientation(edges, orientation);
    if edges == 0 {
        return None;
    }
    // Clearing the lowest set bit leaves nothing iff exactly one bit was set.
    if edges & (edges - 1) == 0 {
        Some(edges.trailing_zeros() as Nucleotide)
    } else {
        None
    }
}

/// Returns the union of the edges over all colours.
///
/// The bytes are processed eight at a time, with a masked tail.
///
/// # Examples
///
/// ```
/// use ctx_graph::edges;
///
/// let per_colour = [0x01, 0x10, 0x00, 0x04, 0x80];
/// assert_eq!(edges::union(&per_colour), 0x95);
/// assert_eq!(edges::union(&[]), 0);
/// ```
pub fn union(edges: &[Edges]) -> Edges {
    if edges.len() == 1 {
        return edges[0];
    }

    let mut chunks = edges.chunks_exact(8);
    let mut result: u64 = 0;
    for chunk in chunks.by_ref() {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chunk);
        result |= u64::from_le_bytes(bytes);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut bytes = [0xFFu8; 8];
        bytes[..tail.len()].copy_from_slice(tail);
        let mask = u64::MAX >> (64 - 8 * tail.len());
        result |= u64::from_le_bytes(bytes) & mask;
    }

    result |= result >> 32;
    result |= result >> 16;
    result |= result >> 8;
    (result & 0xFF) as Edges
}

// Reverses the order of the lowest four bits.
#[inline]
fn rev_nibble(value: u8) -> u8 {
    ((value & 0x1) << 3) | ((value & 0x2) << 1) | ((value & 0x4) >> 1) | ((value & 0x8) >> 3)
}

/// Returns an 8-character representation of the edges.
///
/// The first four characters are the incoming bases in forward orientation in lowercase (`acgt`).
/// The last four characters are the outgoing bases in forward orientation in uppercase (`ACGT`).
/// Missing edges are shown as `.`.
///
/// # Examples
///
/// ```
/// use ctx_graph::edges;
///
/// // Incoming T (reverse orientation outgoing A) and outgoing C and G.
/// assert_eq!(edges::to_display_string(0x16), "...t.CG.");
/// ```
pub fn to_display_string(edges: Edges) -> String {
    const BASES: &[u8; 4] = b"acgt";
    let left = rev_nibble(edges >> 4);
    let right = edges & 0x0F;

    let mut result = String::with_capacity(8);
    for (i, base) in BASES.iter().enumerate() {
        result.push(if left & (1 << i) != 0 { *base as char } else { '.' });
    }
    for (i, base) in BASES.iter().enumerate() {
        result.push(if right & (1 << i) != 0 { base.to_ascii_uppercase() as char } else { '.' });
    }
    result
}

//-----------------------------------------------------------------------------

/// Coverage of a node in one colour.
pub type Covg = u32;

/// Maximum coverage value.
pub const COVG_MAX: Covg = Covg::MAX;

/// Returns `a + b`, saturating at [`COVG_MAX`].
#[inline]
pub fn safe_add_covg(a: Covg, b: Covg) -> Covg {
    let sum = a as u64 + b as u64;
    if sum > COVG_MAX as u64 { COVG_MAX } else { sum as Covg }
}

/// Increments the coverage cell by one unless it has already saturated.
///
/// This is safe to call from multiple threads on the same cell.
/// Returns the new value.
pub fn increment_atomic(cell: &AtomicU32) -> Covg {
    let mut current = cell.load(Ordering::Relaxed);
    while current < COVG_MAX {
        match cell.compare_exchange_weak(current, current + 1, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return current + 1,
            Err(actual) => current = actual,
        }
    }
    current
}

//-----------------------------------------------------------------------------

//! Alignment hits and the mapper abstraction probes are submitted to.
//!
//! The evaluation core only ever talks to [`ProbeMapper`]; [`TruthMapper`] is
//! the production implementation backed by a minimizer index of the truth
//! genome, and tests substitute scripted mappers.

mod cigar;
mod index;
mod truth_mapper;

pub use cigar::{cigar_to_string, parse_extended_cigar, push_op, CigarOp, CigarOpExt};
pub use index::MinimizerIndex;
pub use truth_mapper::{MapParams, MapScoring, TruthMapper};

use crate::utils::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "1"),
            Strand::Reverse => write!(f, "-1"),
        }
    }
}

/// One reported alignment of a probe against a truth contig.
#[derive(Debug, Clone, PartialEq)]
pub struct MapHit {
    pub contig: String,
    pub strand: Strand,
    /// Aligned span of the probe as submitted, 0-based, end exclusive.
    pub query_start: usize,
    pub query_end: usize,
    /// Aligned span on the forward strand of the contig, 0-based, end exclusive.
    pub target_start: usize,
    pub target_end: usize,
    /// Extended CIGAR along the forward strand of the target. For reverse
    /// strand hits it aligns the reverse complement of the probe.
    pub cigar: Vec<CigarOp>,
    pub mapq: u8,
    /// Number of mismatched, inserted and deleted bases.
    pub nm: usize,
}

impl MapHit {
    /// Builds a hit from an extended CIGAR string, deriving the ends and NM.
    pub fn from_cigar_str(
        contig: &str,
        strand: Strand,
        query_start: usize,
        target_start: usize,
        cigar: &str,
        mapq: u8,
    ) -> Result<Self> {
        let cigar = parse_extended_cigar(cigar)?;
        let query_len: usize = cigar.iter().map(|op| op.get_query_len()).sum();
        let target_len: usize = cigar.iter().map(|op| op.get_ref_len()).sum();
        let nm = cigar.iter().map(|op| op.edit_count()).sum();
        Ok(MapHit {
            contig: contig.to_string(),
            strand,
            query_start,
            query_end: query_start + query_len,
            target_start,
            target_end: target_start + target_len,
            cigar,
            mapq,
            nm,
        })
    }

    pub fn cigar_string(&self) -> String {
        cigar_to_string(&self.cigar)
    }
}

/// Anything that can place a nucleotide sequence on the truth genome.
///
/// Hits come back in the mapper's preferred order; callers rely on that order
/// to break ties, so implementations must be deterministic for a given input.
pub trait ProbeMapper: Sync {
    fn map(&self, seq: &str) -> Result<Vec<MapHit>>;
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            b'a' => b't',
            b'c' => b'g',
            b'g' => b'c',
            b't' => b'a',
            other => other,
        })
        .collect()
}

use bio::alignment::distance::levenshtein;

pub const GAP: u8 = b'-';

/// Levenshtein distance between two alleles, no context needed.
pub fn edit_distance_between_seqs(seq1: &str, seq2: &str) -> usize {
    levenshtein(seq1.as_bytes(), seq2.as_bytes()) as usize
}

/// Number of differing columns in two padded alignment strings of equal length.
/// A gap in either string counts as one edit per column.
pub fn edit_distance_from_aln_strings(aln1: &[u8], aln2: &[u8]) -> usize {
    debug_assert_eq!(aln1.len(), aln2.len());
    aln1.iter()
        .zip(aln2)
        .filter(|(a, b)| *a == &GAP || *b == &GAP || !a.eq_ignore_ascii_case(b))
        .count()
}

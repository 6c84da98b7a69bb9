use super::edit_distance::{edit_distance_from_aln_strings, GAP};
use crate::mapping::{revcomp, CigarOp, CigarOpExt, MapHit, Strand};
use crate::utils::{MaskedIntervals, Result};

/// A flanked sequence carrying one allele at `[allele_start, allele_end]`
/// (0-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    seq: String,
    allele_start: usize,
    allele_end: usize,
}

/// Column-wise alignment of the oriented probe against the truth.
#[derive(Debug, Default)]
struct PaddedAlignment {
    probe: Vec<u8>,
    truth: Vec<u8>,
    /// Oriented probe position of each column, None for deletions.
    probe_pos: Vec<Option<usize>>,
    /// Truth position of each column; insertions take the next truth base.
    truth_anchor: Vec<usize>,
}

impl PaddedAlignment {
    fn push(&mut self, probe_pos: Option<usize>, probe: u8, truth: u8, truth_anchor: usize) {
        self.probe_pos.push(probe_pos);
        self.probe.push(probe);
        self.truth.push(truth);
        self.truth_anchor.push(truth_anchor);
    }
}

impl Probe {
    pub fn new(seq: String, allele_start: usize, allele_end: usize) -> Result<Self> {
        if allele_start > allele_end || allele_end >= seq.len() {
            return Err(format!(
                "Invalid allele interval [{}, {}] for probe of length {}",
                allele_start,
                allele_end,
                seq.len()
            ));
        }
        Ok(Probe {
            seq,
            allele_start,
            allele_end,
        })
    }

    pub fn seq(&self) -> &str {
        &self.seq
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn allele_seq(&self) -> &str {
        &self.seq[self.allele_start..=self.allele_end]
    }

    /// 1-based inclusive interval, e.g. `101-101`.
    pub fn interval_string(&self) -> String {
        format!("{}-{}", self.allele_start + 1, self.allele_end + 1)
    }

    /// True if the aligned query span covers the whole allele.
    pub fn includes_allele(&self, hit: &MapHit) -> bool {
        hit.query_start <= self.allele_start && self.allele_end < hit.query_end
    }

    /// Allele interval in the orientation the hit's trace is written in.
    fn oriented_allele(&self, strand: Strand) -> (usize, usize) {
        match strand {
            Strand::Forward => (self.allele_start, self.allele_end),
            Strand::Reverse => (
                self.len() - 1 - self.allele_end,
                self.len() - 1 - self.allele_start,
            ),
        }
    }

    fn oriented_query_start(&self, hit: &MapHit) -> usize {
        match hit.strand {
            Strand::Forward => hit.query_start,
            Strand::Reverse => self.len().saturating_sub(hit.query_end),
        }
    }

    /// Returns (matching bases, allele length considered) along the hit's trace.
    ///
    /// Inserted probe bases count toward the length when they fall inside the
    /// allele, wherever their run starts. A deletion counts when the next probe base is inside the allele, so a gap
    /// just before the first allele base belongs to the allele and one just
    /// after the last base does not.
    pub fn allele_match_counts(&self, hit: &MapHit) -> (usize, usize) {
        let (start, end) = self.oriented_allele(hit.strand);
        let in_allele = |pos: usize| start <= pos && pos <= end;
        let mut qpos = self.oriented_query_start(hit);
        let mut matches = 0;
        let mut total = 0;

        for op in &hit.cigar {
            if qpos > end {
                break;
            }
            match *op {
                CigarOp::Equal(len) | CigarOp::Diff(len) | CigarOp::Match(len) => {
                    let is_match = matches!(op, CigarOp::Equal(_));
                    for pos in qpos..qpos + len as usize {
                        if in_allele(pos) {
                            total += 1;
                            if is_match {
                                matches += 1;
                            }
                        }
                    }
                }
                CigarOp::Ins(len) => {
                    total += (qpos..qpos + len as usize).filter(|&pos| in_allele(pos)).count();
                }
                CigarOp::Del(len) => {
                    if in_allele(qpos) {
                        total += len as usize;
                    }
                }
                _ => {}
            }
            qpos += op.get_query_len();
        }
        (matches, total)
    }

    fn padded_alignment(&self, hit: &MapHit, truth: &[u8]) -> Result<PaddedAlignment> {
        let query = match hit.strand {
            Strand::Forward => self.seq.as_bytes().to_vec(),
            Strand::Reverse => revcomp(self.seq.as_bytes()),
        };
        let query_len: usize = hit.cigar.iter().map(|op| op.get_query_len()).sum();
        let target_len: usize = hit.cigar.iter().map(|op| op.get_ref_len()).sum();
        let mut qpos = self.oriented_query_start(hit);
        let mut tpos = hit.target_start;

        if qpos + query_len > query.len() {
            return Err(format!(
                "Hit on {} uses {} probe bases from {}, probe length is {}",
                hit.contig,
                query_len,
                qpos,
                query.len()
            ));
        }
        if tpos + target_len > truth.len() {
            return Err(format!(
                "Hit {}:{}-{} is out of range for truth sequence of length {}",
                hit.contig,
                tpos,
                tpos + target_len,
                truth.len()
            ));
        }

        let mut aln = PaddedAlignment::default();
        for op in &hit.cigar {
            match *op {
                CigarOp::Equal(len) | CigarOp::Diff(len) | CigarOp::Match(len) => {
                    for _ in 0..len {
                        aln.push(Some(qpos), query[qpos], truth[tpos], tpos);
                        qpos += 1;
                        tpos += 1;
                    }
                }
                CigarOp::Ins(len) => {
                    for _ in 0..len {
                        aln.push(Some(qpos), query[qpos], GAP, tpos);
                        qpos += 1;
                    }
                }
                CigarOp::Del(len) => {
                    for _ in 0..len {
                        aln.push(None, GAP, truth[tpos], tpos);
                        tpos += 1;
                    }
                }
                other => {
                    return Err(format!(
                        "Unsupported CIGAR operation {} in hit on {}",
                        other, hit.contig
                    ))
                }
            }
        }
        Ok(aln)
    }

    /// Edit distance between the allele's truth footprint and the truth, and
    /// whether the footprint touches the mask. Masked columns are not counted.
    pub fn edit_distance_vs_truth(
        &self,
        hit: &MapHit,
        truth: &str,
        mask: Option<&MaskedIntervals>,
    ) -> Result<(usize, bool)> {
        let aln = self.padded_alignment(hit, truth.as_bytes())?;
        let (start, end) = self.oriented_allele(hit.strand);
        let first = aln.probe_pos.iter().position(|&p| p == Some(start));
        let last = aln.probe_pos.iter().rposition(|&p| p == Some(end));
        let (mut first, mut last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(format!(
                    "Allele {} is not covered by hit on {}:{}",
                    self.interval_string(),
                    hit.contig,
                    hit.target_start + 1
                ))
            }
        };
        while first > 0 && aln.probe_pos[first - 1].is_none() {
            first -= 1;
        }
        while last + 1 < aln.probe_pos.len() && aln.probe_pos[last + 1].is_none() {
            last += 1;
        }

        let mut in_mask = false;
        let mut probe_cols = Vec::with_capacity(last - first + 1);
        let mut truth_cols = Vec::with_capacity(last - first + 1);
        for col in first..=last {
            if mask.is_some_and(|m| m.contains(aln.truth_anchor[col])) {
                in_mask = true;
                continue;
            }
            probe_cols.push(aln.probe[col]);
            truth_cols.push(aln.truth[col]);
        }
        Ok((edit_distance_from_aln_strings(&probe_cols, &truth_cols), in_mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TruthMask;

    const TRUTH: &str = "TTTTACGTACGTACTTTTTT";

    fn hit(strand: Strand, query_start: usize, cigar: &str) -> MapHit {
        MapHit::from_cigar_str("truth", strand, query_start, 4, cigar, 60).unwrap()
    }

    fn probe(seq: &str, start: usize, end: usize) -> Probe {
        Probe::new(seq.to_string(), start, end).unwrap()
    }

    #[test]
    fn test_new_checks_interval() {
        assert!(Probe::new("ACGT".into(), 2, 1).is_err());
        assert!(Probe::new("ACGT".into(), 1, 4).is_err());
        let p = probe("ACGT", 1, 2);
        assert_eq!(p.allele_seq(), "CG");
        assert_eq!(p.interval_string(), "2-3");
    }

    #[test]
    fn test_includes_allele() {
        let p = probe("ACGTACGTAC", 4, 5);
        let mut h = hit(Strand::Forward, 0, "10=");
        assert!(p.includes_allele(&h));
        h.query_start = 3;
        h.query_end = 6;
        assert!(p.includes_allele(&h));
        h.query_start = 5;
        h.query_end = 10;
        assert!(!p.includes_allele(&h));
        h.query_start = 0;
        h.query_end = 5;
        assert!(!p.includes_allele(&h));
    }

    #[test]
    fn test_match_counts_forward() {
        let p = probe("ACGTACGTAC", 4, 5);
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "10=")), (2, 2));
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "4=1X5=")), (1, 2));
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "5=2I3=")), (1, 2));
    }

    #[test]
    fn test_match_counts_insertion_across_allele_start() {
        let p = probe("ACGTACGTAC", 4, 6);
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "3=2I5=")), (2, 3));

        let p = probe("ACGTACGTAC", 4, 5);
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "3=3I4=")), (0, 2));
    }

    #[test]
    fn test_match_counts_deletion_at_boundary() {
        let p = probe("ACGTACGTAC", 4, 5);
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "4=3D6=")), (2, 5));
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 0, "6=2D4=")), (2, 2));
    }

    #[test]
    fn test_match_counts_reverse() {
        let p = probe("ACGTACGTAC", 1, 2);
        assert_eq!(p.allele_match_counts(&hit(Strand::Reverse, 0, "7=1X2=")), (1, 2));
        assert_eq!(p.allele_match_counts(&hit(Strand::Reverse, 0, "10=")), (2, 2));
    }

    #[test]
    fn test_match_counts_clipped_hit() {
        let p = probe("GGACGTACGTAC", 6, 7);
        assert_eq!(p.allele_match_counts(&hit(Strand::Forward, 2, "4=1X5=")), (1, 2));
    }

    #[test]
    fn test_edit_distance_vs_truth() {
        let p = probe("ACGTTCGTAC", 4, 5);
        let h = hit(Strand::Forward, 0, "4=1X5=");
        assert_eq!(p.edit_distance_vs_truth(&h, TRUTH, None).unwrap(), (1, false));

        let p = probe("ACGTACGTAC", 4, 5);
        let h = hit(Strand::Forward, 0, "10=");
        assert_eq!(p.edit_distance_vs_truth(&h, TRUTH, None).unwrap(), (0, false));
    }

    #[test]
    fn test_edit_distance_vs_truth_with_mask() {
        let p = probe("ACGTTCGTAC", 4, 5);
        let h = hit(Strand::Forward, 0, "4=1X5=");
        let mask = TruthMask::from_positions("truth", &[8]);
        assert_eq!(
            p.edit_distance_vs_truth(&h, TRUTH, mask.for_contig("truth"))
                .unwrap(),
            (0, true)
        );
        let mask = TruthMask::from_positions("truth", &[3, 10]);
        assert_eq!(
            p.edit_distance_vs_truth(&h, TRUTH, mask.for_contig("truth"))
                .unwrap(),
            (1, false)
        );
    }

    #[test]
    fn test_edit_distance_widens_over_deletion() {
        let p = probe("ACGTCGTAC", 4, 4);
        let h = hit(Strand::Forward, 0, "4=1D5=");
        assert_eq!(p.edit_distance_vs_truth(&h, TRUTH, None).unwrap(), (1, false));
        assert_eq!(p.allele_match_counts(&h), (1, 2));

        let p = probe("ACGTCGTAC", 3, 4);
        assert_eq!(p.edit_distance_vs_truth(&h, TRUTH, None).unwrap(), (1, false));
    }

    #[test]
    fn test_edit_distance_insertion() {
        let p = probe("ACGTAGGCGTAC", 4, 6);
        let h = hit(Strand::Forward, 0, "5=2I5=");
        assert_eq!(p.edit_distance_vs_truth(&h, TRUTH, None).unwrap(), (2, false));
        assert_eq!(p.allele_match_counts(&h), (1, 3));
    }

    #[test]
    fn test_edit_distance_reverse() {
        let p = probe("GTACGTACGT", 1, 2);
        let h = hit(Strand::Reverse, 0, "10=");
        assert_eq!(p.edit_distance_vs_truth(&h, TRUTH, None).unwrap(), (0, false));
        let mask = TruthMask::from_positions("truth", &[11]);
        assert_eq!(
            p.edit_distance_vs_truth(&h, TRUTH, mask.for_contig("truth"))
                .unwrap(),
            (0, true)
        );
        let mask = TruthMask::from_positions("truth", &[4]);
        assert_eq!(
            p.edit_distance_vs_truth(&h, TRUTH, mask.for_contig("truth"))
                .unwrap(),
            (0, false)
        );
    }

    #[test]
    fn test_edit_distance_out_of_range() {
        let p = probe("ACGTACGTAC", 4, 5);
        let mut h = hit(Strand::Forward, 0, "10=");
        h.target_start = 15;
        assert!(p.edit_distance_vs_truth(&h, TRUTH, None).is_err());
    }
}

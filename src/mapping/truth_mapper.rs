use super::{
    index::{minimizers, MinimizerIndex},
    push_op, revcomp, CigarOp, CigarOpExt, MapHit, ProbeMapper, Strand,
};
use crate::utils::{Result, SequenceStore};
use bio::alignment::{
    pairwise::{banded, Scoring},
    AlignmentOperation,
};
use itertools::Itertools;

const MAX_MAPQ: u8 = 60;
const CLIP_PENALTY: i32 = 10;

/// Pairwise scoring for probe alignment. Penalties are given as positive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapScoring {
    pub match_scr: i32,
    pub mism_scr: i32,
    pub gapo_scr: i32,
    pub gape_scr: i32,
}

impl Default for MapScoring {
    fn default() -> Self {
        MapScoring {
            match_scr: 1,
            mism_scr: 1,
            gapo_scr: 5,
            gape_scr: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapParams {
    pub scoring: MapScoring,
    pub kmer_len: usize,
    pub window: usize,
    pub bandwidth: usize,
    pub min_score: i32,
    /// Minimizers seen more often than this in the truth are not used as seeds.
    pub max_occurrences: usize,
}

impl Default for MapParams {
    fn default() -> Self {
        MapParams {
            scoring: MapScoring::default(),
            kmer_len: 15,
            window: 10,
            bandwidth: 10,
            min_score: 30,
            max_occurrences: 500,
        }
    }
}

#[derive(Debug)]
struct Locus {
    contig: usize,
    min_diag: i64,
    max_diag: i64,
}

#[derive(Debug)]
struct Candidate {
    contig: usize,
    strand: Strand,
    xstart: usize,
    xend: usize,
    target_start: usize,
    target_end: usize,
    cigar: Vec<CigarOp>,
    score: i32,
}

/// Maps probes onto the truth genome: minimizer seeding on both strands,
/// then banded alignment of the probe against a window around each seed cluster.
pub struct TruthMapper<'a> {
    contigs: Vec<(&'a str, &'a [u8])>,
    index: MinimizerIndex,
    params: MapParams,
}

impl<'a> TruthMapper<'a> {
    pub fn new(truth: &'a SequenceStore, params: MapParams) -> Result<Self> {
        let contigs = truth
            .iter()
            .map(|(name, seq)| (name, seq.as_bytes()))
            .collect_vec();
        let index = MinimizerIndex::new(
            contigs.iter().map(|(_, seq)| *seq),
            params.kmer_len,
            params.window,
        )?;
        Ok(TruthMapper {
            contigs,
            index,
            params,
        })
    }

    fn scoring(&self) -> Scoring<impl Fn(u8, u8) -> i32> {
        let s = self.params.scoring;
        Scoring {
            match_fn: move |a: u8, b: u8| if a == b { s.match_scr } else { -s.mism_scr },
            match_scores: Some((s.match_scr, -s.mism_scr)),
            gap_open: -s.gapo_scr,
            gap_extend: -s.gape_scr,
            xclip_prefix: -CLIP_PENALTY,
            xclip_suffix: -CLIP_PENALTY,
            yclip_prefix: 0,
            yclip_suffix: 0,
        }
    }

    fn find_loci(&self, query: &[u8]) -> Vec<Locus> {
        let mut anchors = Vec::new();
        for (hash, qpos) in minimizers(query, self.index.kmer_len(), self.index.window()) {
            let entries = self.index.lookup(hash);
            if entries.len() > self.params.max_occurrences {
                continue;
            }
            anchors.extend(
                entries
                    .iter()
                    .map(|e| (e.contig as usize, e.pos as i64 - qpos as i64)),
            );
        }
        anchors.sort_unstable();
        anchors.dedup();

        let max_spread = query.len() as i64;
        let mut loci: Vec<Locus> = Vec::new();
        for (contig, diag) in anchors {
            match loci.last_mut() {
                Some(locus) if locus.contig == contig && diag - locus.min_diag <= max_spread => {
                    locus.max_diag = diag;
                }
                _ => loci.push(Locus {
                    contig,
                    min_diag: diag,
                    max_diag: diag,
                }),
            }
        }
        loci
    }

    fn align_locus(&self, query: &[u8], strand: Strand, locus: &Locus) -> Option<Candidate> {
        let contig_seq = self.contigs[locus.contig].1;
        let pad = query.len() as i64;
        let win_start = (locus.min_diag - pad).max(0) as usize;
        let win_end = ((locus.max_diag + 2 * pad).max(0) as usize).min(contig_seq.len());
        if win_start >= win_end {
            return None;
        }
        let window = &contig_seq[win_start..win_end];

        let mut aligner = banded::Aligner::with_capacity_and_scoring(
            query.len(),
            window.len(),
            self.scoring(),
            self.index.kmer_len(),
            self.params.bandwidth,
        );
        let aln = aligner.custom(query, window);
        if aln.score < self.params.min_score {
            return None;
        }

        let mut cigar = Vec::new();
        for op in &aln.operations {
            let op = match op {
                AlignmentOperation::Match => CigarOp::Equal(1),
                AlignmentOperation::Subst => CigarOp::Diff(1),
                AlignmentOperation::Ins => CigarOp::Ins(1),
                AlignmentOperation::Del => CigarOp::Del(1),
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => continue,
            };
            push_op(&mut cigar, op);
        }
        if !cigar.iter().any(|op| matches!(op, CigarOp::Equal(_))) {
            return None;
        }

        Some(Candidate {
            contig: locus.contig,
            strand,
            xstart: aln.xstart,
            xend: aln.xend,
            target_start: win_start + aln.ystart,
            target_end: win_start + aln.yend,
            cigar,
            score: aln.score,
        })
    }

    /// Orders candidates best first, drops those overlapping a better hit on
    /// the same contig and strand, and assigns mapping qualities.
    fn finalize(&self, mut candidates: Vec<Candidate>, query_len: usize) -> Vec<MapHit> {
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        let mut kept: Vec<Candidate> = Vec::new();
        for cand in candidates {
            let overlaps_kept = kept.iter().any(|k| {
                k.contig == cand.contig
                    && k.strand == cand.strand
                    && cand.target_start < k.target_end
                    && k.target_start < cand.target_end
            });
            if !overlaps_kept {
                kept.push(cand);
            }
        }

        let best_mapq = match (kept.first(), kept.get(1)) {
            (Some(best), Some(second)) => {
                let frac = 1.0 - second.score as f64 / best.score as f64;
                (frac * MAX_MAPQ as f64).round().clamp(0.0, MAX_MAPQ as f64) as u8
            }
            _ => MAX_MAPQ,
        };

        kept.into_iter()
            .enumerate()
            .map(|(rank, cand)| {
                let (query_start, query_end) = match cand.strand {
                    Strand::Forward => (cand.xstart, cand.xend),
                    Strand::Reverse => (query_len - cand.xend, query_len - cand.xstart),
                };
                MapHit {
                    contig: self.contigs[cand.contig].0.to_string(),
                    strand: cand.strand,
                    query_start,
                    query_end,
                    target_start: cand.target_start,
                    target_end: cand.target_end,
                    nm: cand.cigar.iter().map(|op| op.edit_count()).sum(),
                    cigar: cand.cigar,
                    mapq: if rank == 0 { best_mapq } else { 0 },
                }
            })
            .collect()
    }
}

impl ProbeMapper for TruthMapper<'_> {
    fn map(&self, seq: &str) -> Result<Vec<MapHit>> {
        let query = seq.to_ascii_uppercase().into_bytes();
        if query.len() < self.index.kmer_len() {
            log::debug!("Probe of length {} is shorter than the k-mer length", query.len());
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for strand in [Strand::Forward, Strand::Reverse] {
            let oriented = match strand {
                Strand::Forward => query.clone(),
                Strand::Reverse => revcomp(&query),
            };
            for locus in self.find_loci(&oriented) {
                if let Some(cand) = self.align_locus(&oriented, strand, &locus) {
                    candidates.push(cand);
                }
            }
        }
        Ok(self.finalize(candidates, query.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_genome(len: usize, seed: u64) -> String {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| ['A', 'C', 'G', 'T'][rng.random_range(0..4)])
            .collect()
    }

    fn truth_store() -> SequenceStore {
        [("truth", random_genome(2000, 7)), ("other", random_genome(1500, 11))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_exact_probe_maps_forward() {
        let truth = truth_store();
        let mapper = TruthMapper::new(&truth, MapParams::default()).unwrap();
        let probe = &truth.get("truth").unwrap()[500..600];
        let hits = mapper.map(probe).unwrap();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.contig, "truth");
        assert_eq!(hit.strand, Strand::Forward);
        assert_eq!((hit.query_start, hit.query_end), (0, 100));
        assert_eq!((hit.target_start, hit.target_end), (500, 600));
        assert_eq!(hit.cigar_string(), "100=");
        assert_eq!(hit.nm, 0);
        assert_eq!(hit.mapq, 60);
    }

    #[test]
    fn test_snp_probe_reports_mismatch() {
        let truth = truth_store();
        let mapper = TruthMapper::new(&truth, MapParams::default()).unwrap();
        let mut probe = truth.get("other").unwrap()[200..300].as_bytes().to_vec();
        probe[50] = if probe[50] == b'A' { b'C' } else { b'A' };
        let probe = String::from_utf8(probe).unwrap();
        let hits = mapper.map(&probe).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].contig, "other");
        assert_eq!(hits[0].target_start, 200);
        assert_eq!(hits[0].cigar_string(), "50=1X49=");
        assert_eq!(hits[0].nm, 1);
    }

    #[test]
    fn test_revcomp_probe_maps_reverse() {
        let truth = truth_store();
        let mapper = TruthMapper::new(&truth, MapParams::default()).unwrap();
        let probe = revcomp(truth.get("truth").unwrap()[1000..1080].as_bytes());
        let probe = String::from_utf8(probe).unwrap();
        let hits = mapper.map(&probe).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].strand, Strand::Reverse);
        assert_eq!((hits[0].query_start, hits[0].query_end), (0, 80));
        assert_eq!((hits[0].target_start, hits[0].target_end), (1000, 1080));
        assert_eq!(hits[0].cigar_string(), "80=");
    }

    #[test]
    fn test_unrelated_probe_is_unmapped() {
        let truth = truth_store();
        let mapper = TruthMapper::new(&truth, MapParams::default()).unwrap();
        let probe = random_genome(100, 99);
        assert!(mapper.map(&probe).unwrap().is_empty());
        assert!(mapper.map("ACGT").unwrap().is_empty());
    }

    #[test]
    fn test_repeat_gets_zero_mapq() {
        let unit = random_genome(120, 3);
        let genome = format!("{}{}{}", random_genome(300, 4), unit, random_genome(300, 5));
        let genome = format!("{}{}", genome, unit);
        let truth: SequenceStore = [("truth", genome)].into_iter().collect();
        let mapper = TruthMapper::new(&truth, MapParams::default()).unwrap();
        let hits = mapper.map(&unit[10..110]).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.mapq == 0));
    }
}

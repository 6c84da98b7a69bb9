use super::probe::Probe;
use crate::mapping::MapHit;

/// The chosen alt hit with its allele match counts.
#[derive(Debug, Clone, Copy)]
pub struct AlleleMatch<'h> {
    pub hit: &'h MapHit,
    pub matches: usize,
    pub allele_len: usize,
}

/// Picks the hit containing the allele with the most matching allele bases.
/// Ties keep the earlier hit, so the result follows the mapper's hit order.
pub fn select_alt_hit<'h>(probe: &Probe, hits: &'h [MapHit]) -> Option<AlleleMatch<'h>> {
    let mut best: Option<AlleleMatch<'h>> = None;
    for hit in hits.iter().filter(|hit| probe.includes_allele(hit)) {
        let (matches, allele_len) = probe.allele_match_counts(hit);
        if best.map_or(true, |b| matches > b.matches) {
            best = Some(AlleleMatch {
                hit,
                matches,
                allele_len,
            });
        }
    }
    best
}

/// Ref hits comparable to the alt hit: containing the allele and starting at
/// the same truth position on the same contig. Sorted by NM, lowest first.
pub fn select_ref_hits<'h>(probe: &Probe, hits: &'h [MapHit], alt_hit: &MapHit) -> Vec<&'h MapHit> {
    let mut selected: Vec<&MapHit> = hits
        .iter()
        .filter(|hit| {
            probe.includes_allele(hit)
                && hit.contig == alt_hit.contig
                && hit.target_start == alt_hit.target_start
        })
        .collect();
    selected.sort_by_key(|hit| hit.nm);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Strand;

    fn hit(contig: &str, query_start: usize, target_start: usize, cigar: &str) -> MapHit {
        MapHit::from_cigar_str(contig, Strand::Forward, query_start, target_start, cigar, 60)
            .unwrap()
    }

    fn probe() -> Probe {
        Probe::new("ACGTACGTAC".to_string(), 4, 5).unwrap()
    }

    #[test]
    fn test_alt_hit_most_matches() {
        let hits = vec![
            hit("a", 0, 100, "4=1X5="),
            hit("b", 0, 200, "10="),
            hit("c", 0, 300, "5=1X4="),
        ];
        let best = select_alt_hit(&probe(), &hits).unwrap();
        assert_eq!(best.hit.contig, "b");
        assert_eq!((best.matches, best.allele_len), (2, 2));
    }

    #[test]
    fn test_alt_hit_tie_keeps_first() {
        let hits = vec![hit("a", 0, 100, "10="), hit("b", 0, 200, "10=")];
        assert_eq!(select_alt_hit(&probe(), &hits).unwrap().hit.contig, "a");
    }

    #[test]
    fn test_alt_hit_zero_matches_still_selected() {
        let hits = vec![hit("a", 0, 100, "4=2X4=")];
        let best = select_alt_hit(&probe(), &hits).unwrap();
        assert_eq!((best.matches, best.allele_len), (0, 2));
    }

    #[test]
    fn test_alt_hit_requires_allele() {
        let hits = vec![hit("a", 5, 100, "5="), hit("b", 0, 100, "5=")];
        assert!(select_alt_hit(&probe(), &hits).is_none());
        assert!(select_alt_hit(&probe(), &[]).is_none());
    }

    #[test]
    fn test_ref_hits_same_locus_sorted_by_nm() {
        let alt = hit("a", 0, 100, "10=");
        let hits = vec![
            hit("a", 0, 100, "3=1X2=1X3="),
            hit("a", 0, 101, "10="),
            hit("b", 0, 100, "10="),
            hit("a", 0, 100, "4=1X5="),
            hit("a", 6, 106, "4="),
            hit("a", 0, 100, "1X9="),
        ];
        let refs = select_ref_hits(&probe(), &hits, &alt);
        assert_eq!(refs.iter().map(|h| h.nm).collect::<Vec<_>>(), vec![1, 1, 2]);
        assert_eq!(refs[0].cigar_string(), "4=1X5=");
        assert_eq!(refs[1].cigar_string(), "1X9=");
    }
}

use super::{probe::Probe, qc::VFR_FILTER};
use crate::utils::{Result, SequenceStore};
use crate::vcf::VariantRecord;

pub const PASS: &str = "PASS";
pub const FAIL_BUT_TEST: &str = "FAIL_BUT_TEST";
pub const FAIL_CONFLICT: &str = "FAIL_CONFLICT";
pub const REF_STRING_MISMATCH: &str = "REF_STRING_MISMATCH";

/// `VFR_FILTER` values that are evaluated.
#[derive(Debug, Clone, Copy)]
pub struct WantedFilters {
    use_fail_conflict: bool,
}

impl WantedFilters {
    pub fn new(use_fail_conflict: bool) -> Self {
        WantedFilters { use_fail_conflict }
    }

    pub fn contains(&self, filter: Option<&str>) -> bool {
        match filter {
            Some(PASS) | Some(FAIL_BUT_TEST) => true,
            Some(FAIL_CONFLICT) => self.use_fail_conflict,
            _ => false,
        }
    }

    pub fn wants(&self, record: &VariantRecord) -> bool {
        self.contains(record.format.get(VFR_FILTER))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePair {
    pub ref_probe: Probe,
    pub alt_probe: Probe,
}

/// Builds the ref and called-allele probes for a record.
///
/// Returns None for records that are not wanted, and for records whose REF
/// does not match the reference, which are re-labelled `REF_STRING_MISMATCH`.
pub fn build_probes(
    record: &mut VariantRecord,
    ref_seqs: &SequenceStore,
    flank_len: usize,
    wanted: &WantedFilters,
) -> Result<Option<ProbePair>> {
    if !wanted.wants(record) {
        return Ok(None);
    }

    let ref_seq = ref_seqs.get(&record.chrom)?;
    let ref_end = record.ref_end_pos();
    let declared_ref = ref_seq.get(record.pos..record.pos + record.ref_allele.len());
    if declared_ref != Some(record.ref_allele.as_str()) {
        log::debug!(
            "REF {} does not match reference at {}:{}",
            record.ref_allele,
            record.chrom,
            record.pos + 1
        );
        record.format.set(VFR_FILTER, REF_STRING_MISMATCH);
        return Ok(None);
    }

    let flank_start = record.pos.saturating_sub(flank_len);
    let flank_end = (ref_seq.len() - 1).min(ref_end + flank_len);
    let left_flank = &ref_seq[flank_start..record.pos];
    let right_flank = &ref_seq[ref_end + 1..=flank_end];
    let allele_start = record.pos - flank_start;

    let alt_allele = record.allele(record.called_allele_index()?)?;
    let alt_probe = splice_probe(left_flank, alt_allele, right_flank, allele_start)?;
    debug_assert_eq!(alt_probe.allele_seq(), alt_allele);

    let ref_probe = splice_probe(left_flank, &record.ref_allele, right_flank, allele_start)?;
    debug_assert_eq!(ref_probe.allele_seq(), record.ref_allele);

    Ok(Some(ProbePair {
        ref_probe,
        alt_probe,
    }))
}

fn splice_probe(left: &str, allele: &str, right: &str, allele_start: usize) -> Result<Probe> {
    let seq = [left, allele, right].concat();
    Probe::new(seq, allele_start, (allele_start + allele.len()).saturating_sub(1))
}

/// Probes for each record in order; an error ends the run.
pub fn probe_stream<'a, I>(
    records: I,
    ref_seqs: &'a SequenceStore,
    flank_len: usize,
    wanted: &'a WantedFilters,
) -> impl Iterator<Item = Result<(VariantRecord, Option<ProbePair>)>> + 'a
where
    I: IntoIterator<Item = VariantRecord>,
    I::IntoIter: 'a,
{
    records.into_iter().map(move |mut record| {
        let probes = build_probes(&mut record, ref_seqs, flank_len, wanted)?;
        Ok((record, probes))
    })
}

//! Per-record evaluation: map the probes, pick hits, score against the truth
//! and write the verdict back onto the record.

use super::{
    edit_distance::edit_distance_between_seqs,
    hit_selector::{select_alt_hit, select_ref_hits},
    probe::Probe,
    probe_builder::{ProbePair, WantedFilters},
};
use crate::mapping::{MapHit, ProbeMapper};
use crate::utils::{MaskedIntervals, Result, SequenceStore, TruthMask};
use crate::vcf::VariantRecord;
use std::fmt;

pub const VFR_ED_RA: &str = "VFR_ED_RA";
pub const VFR_ED_TR: &str = "VFR_ED_TR";
pub const VFR_ED_TA: &str = "VFR_ED_TA";
pub const VFR_ED_SCORE: &str = "VFR_ED_SCORE";
pub const VFR_ALLELE_LEN: &str = "VFR_ALLELE_LEN";
pub const VFR_ALLELE_MATCH_COUNT: &str = "VFR_ALLELE_MATCH_COUNT";
pub const VFR_ALLELE_MATCH_FRAC: &str = "VFR_ALLELE_MATCH_FRAC";
pub const VFR_IN_MASK: &str = "VFR_IN_MASK";
pub const VFR_RESULT: &str = "VFR_RESULT";
pub const VFR_REF_PROBE: &str = "VFR_REF_PROBE";
pub const VFR_REF_PROBE_ALLELE_INTERVAL: &str = "VFR_REF_PROBE_ALLELE_INTERVAL";
pub const VFR_ALT_PROBE: &str = "VFR_ALT_PROBE";
pub const VFR_ALT_PROBE_ALLELE_INTERVAL: &str = "VFR_ALT_PROBE_ALLELE_INTERVAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    ProbeUnmapped,
    Fp,
    RefProbeBetterMatch,
    PartialTp,
    Tp,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::ProbeUnmapped => "FP_PROBE_UNMAPPED",
            Classification::Fp => "FP",
            Classification::RefProbeBetterMatch => "FP_REF_PROBE_BETTER_MATCH",
            Classification::PartialTp => "Partial_TP",
            Classification::Tp => "TP",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvalParams {
    pub wanted: WantedFilters,
    pub output_probes: bool,
}

/// Read-only inputs shared by every record evaluation.
pub struct EvalContext<'a> {
    pub mapper: &'a dyn ProbeMapper,
    pub truth: &'a SequenceStore,
    pub truth_mask: Option<&'a TruthMask>,
    pub params: EvalParams,
}

impl EvalContext<'_> {
    fn mask_for(&self, contig: &str) -> Option<&MaskedIntervals> {
        self.truth_mask.and_then(|mask| mask.for_contig(contig))
    }
}

/// Map log lines for one record. Lines are only rendered when enabled.
#[derive(Debug, Default)]
pub struct Diagnostics {
    enabled: bool,
    lines: Vec<String>,
}

impl Diagnostics {
    pub fn new(enabled: bool) -> Self {
        Diagnostics {
            enabled,
            lines: Vec::new(),
        }
    }

    fn push<F: FnOnce() -> String>(&mut self, line: F) {
        if self.enabled {
            self.lines.push(line());
        }
    }

    fn push_probe(&mut self, label: &str, record: &VariantRecord, probe: &Probe, hits: &[MapHit]) {
        self.push(|| format!("VCF\t{}", record));
        self.push(|| format!("{}_PROBE\tlen={}\t{}", label, probe.len(), probe.seq()));
        for hit in hits {
            self.push(|| format!("{}_PROBE_HIT\t{}", label, hit_debug_string(hit, probe)));
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

fn hit_debug_string(hit: &MapHit, probe: &Probe) -> String {
    format!(
        "contain_allele={}\tctg={}\tstrand={}\tqstart/end={}/{}\trstart/end={}/{}\tcigar={}\tmapq={}\tNM={}",
        probe.includes_allele(hit),
        hit.contig,
        hit.strand,
        hit.query_start,
        hit.query_end,
        hit.target_start,
        hit.target_end,
        hit.cigar_string(),
        hit.mapq,
        hit.nm
    )
}

/// Match fraction rounded to 5 decimals, 0 when nothing was considered.
pub fn match_fraction(matches: usize, allele_len: usize) -> f64 {
    if allele_len == 0 {
        return 0.0;
    }
    (matches as f64 / allele_len as f64 * 1e5).round() / 1e5
}

/// Renders the match fraction the way it is stored: `0`, `0.33333`, `1.0`.
pub fn format_match_fraction(matches: usize, allele_len: usize) -> String {
    if allele_len == 0 {
        "0".to_string()
    } else {
        format!("{:?}", match_fraction(matches, allele_len))
    }
}

pub fn classify(
    matches: usize,
    allele_len: usize,
    alt_nm: usize,
    ref_hits: &[&MapHit],
) -> Classification {
    if matches == 0 || allele_len == 0 {
        Classification::Fp
    } else if match_fraction(matches, allele_len) == 1.0 {
        if ref_hits.iter().any(|hit| hit.nm < alt_nm) {
            Classification::RefProbeBetterMatch
        } else {
            Classification::Tp
        }
    } else {
        Classification::PartialTp
    }
}

/// Evaluates one record, annotating it in place. Returns None when the record
/// is not evaluated.
pub fn evaluate_record(
    ctx: &EvalContext,
    record: &mut VariantRecord,
    probes: Option<&ProbePair>,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Classification>> {
    if ctx.params.output_probes {
        if let Some(probes) = probes {
            record.format.set(VFR_REF_PROBE, probes.ref_probe.seq());
            record
                .format
                .set(VFR_REF_PROBE_ALLELE_INTERVAL, probes.ref_probe.interval_string());
            record.format.set(VFR_ALT_PROBE, probes.alt_probe.seq());
            record
                .format
                .set(VFR_ALT_PROBE_ALLELE_INTERVAL, probes.alt_probe.interval_string());
        }
    }

    if !ctx.params.wanted.wants(record) {
        return Ok(None);
    }
    let Some(ProbePair {
        ref_probe,
        alt_probe,
    }) = probes
    else {
        return Ok(None);
    };

    let ed_ra = edit_distance_between_seqs(ref_probe.allele_seq(), alt_probe.allele_seq());
    record.format.set(VFR_ED_RA, ed_ra.to_string());

    let alt_hits = ctx.mapper.map(alt_probe.seq())?;
    diagnostics.push_probe("ALT", record, alt_probe, &alt_hits);
    let alt_hits: Vec<MapHit> = alt_hits.into_iter().filter(|hit| hit.mapq > 0).collect();

    let Some(alt) = select_alt_hit(alt_probe, &alt_hits) else {
        let result = Classification::ProbeUnmapped;
        record.format.set(VFR_RESULT, result.as_str());
        record.format.set(VFR_ED_SCORE, "0");
        record.format.set(VFR_ALLELE_LEN, "0");
        record.format.set(VFR_ALLELE_MATCH_COUNT, "0");
        record.format.set(VFR_ALLELE_MATCH_FRAC, "0");
        diagnostics.push(|| format!("FINISH:\t{}", record));
        return Ok(Some(result));
    };

    let ref_hits = ctx.mapper.map(ref_probe.seq())?;
    diagnostics.push_probe("REF", record, ref_probe, &ref_hits);
    let ref_hits: Vec<MapHit> = ref_hits.into_iter().filter(|hit| hit.mapq > 0).collect();
    let ref_hits = select_ref_hits(ref_probe, &ref_hits, alt.hit);

    let mut ref_in_mask = false;
    if let Some(best_ref) = ref_hits.first() {
        let truth_seq = ctx.truth.get(&best_ref.contig)?;
        let (ed_tr, in_mask) =
            ref_probe.edit_distance_vs_truth(best_ref, truth_seq, ctx.mask_for(&best_ref.contig))?;
        record.format.set(VFR_ED_TR, ed_tr.to_string());
        ref_in_mask = in_mask;
    }

    let truth_seq = ctx.truth.get(&alt.hit.contig)?;
    let (ed_ta, alt_in_mask) =
        alt_probe.edit_distance_vs_truth(alt.hit, truth_seq, ctx.mask_for(&alt.hit.contig))?;
    record.format.set(VFR_ED_TA, ed_ta.to_string());
    record.format.set(VFR_ALLELE_LEN, alt.allele_len.to_string());
    record
        .format
        .set(VFR_ALLELE_MATCH_COUNT, alt.matches.to_string());
    record.format.set(
        VFR_ALLELE_MATCH_FRAC,
        format_match_fraction(alt.matches, alt.allele_len),
    );
    let in_mask = if ref_in_mask || alt_in_mask { "1" } else { "0" };
    record.format.set(VFR_IN_MASK, in_mask);

    let result = classify(alt.matches, alt.allele_len, alt.hit.nm, &ref_hits);
    record.format.set(VFR_RESULT, result.as_str());
    diagnostics.push(|| format!("FINISH:\t{}", record));
    Ok(Some(result))
}

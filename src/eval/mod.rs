//! Probe construction, hit selection and classification of variant calls
//! against the truth genome.

mod classifier;
mod edit_distance;
mod hit_selector;
mod probe;
mod probe_builder;
mod qc;

pub use classifier::{
    classify, evaluate_record, format_match_fraction, match_fraction, Classification,
    Diagnostics, EvalContext, EvalParams, VFR_ALLELE_LEN, VFR_ALLELE_MATCH_COUNT,
    VFR_ALLELE_MATCH_FRAC, VFR_ALT_PROBE, VFR_ALT_PROBE_ALLELE_INTERVAL, VFR_ED_RA, VFR_ED_SCORE,
    VFR_ED_TA, VFR_ED_TR, VFR_IN_MASK, VFR_REF_PROBE, VFR_REF_PROBE_ALLELE_INTERVAL, VFR_RESULT,
};
pub use edit_distance::{edit_distance_between_seqs, edit_distance_from_aln_strings};
pub use hit_selector::{select_alt_hit, select_ref_hits, AlleleMatch};
pub use probe::Probe;
pub use probe_builder::{
    build_probes, probe_stream, ProbePair, WantedFilters, FAIL_BUT_TEST, FAIL_CONFLICT, PASS,
    REF_STRING_MISMATCH,
};
pub use qc::{annotate_qc, VFR_FILTER};

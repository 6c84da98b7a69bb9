use crate::vcf::VariantRecord;
use itertools::Itertools;

pub const VFR_FILTER: &str = "VFR_FILTER";

/// Assigns `VFR_FILTER` to records that do not carry one yet. Values set
/// upstream (e.g. `FAIL_CONFLICT`) are left alone.
pub fn annotate_qc(record: &mut VariantRecord, want_ref_calls: bool) {
    if record.format.contains(VFR_FILTER) {
        return;
    }
    let filter = qc_filter(record, want_ref_calls);
    record.format.set(VFR_FILTER, filter);
}

fn qc_filter(record: &VariantRecord, want_ref_calls: bool) -> &'static str {
    let alleles = match record.genotype_alleles() {
        Some(alleles) if !alleles.iter().any(|a| a.is_empty() || *a == ".") => alleles,
        _ => return "NO_GT",
    };
    let distinct = alleles.into_iter().unique().collect_vec();
    if distinct.len() > 1 {
        "HET"
    } else if !want_ref_calls && distinct.iter().all(|a| *a == "0") {
        "REF_CALL"
    } else if record.filters.is_empty() || record.filters.iter().all(|f| *f == "PASS") {
        "PASS"
    } else {
        "FAIL_BUT_TEST"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gt: Option<&str>, filters: &[&str]) -> VariantRecord {
        let mut record = VariantRecord::new("ref", 5, "A", &["G"]);
        if let Some(gt) = gt {
            record.format.load("GT", gt.to_string());
        }
        record.filters = filters.iter().map(|f| f.to_string()).collect();
        record
    }

    fn filter_for(gt: Option<&str>, filters: &[&str], want_ref_calls: bool) -> String {
        let mut record = record(gt, filters);
        annotate_qc(&mut record, want_ref_calls);
        record.format.get(VFR_FILTER).unwrap().to_string()
    }

    #[test]
    fn test_qc_filters() {
        assert_eq!(filter_for(None, &[], false), "NO_GT");
        assert_eq!(filter_for(Some("./."), &[], false), "NO_GT");
        assert_eq!(filter_for(Some("0/1"), &["PASS"], false), "HET");
        assert_eq!(filter_for(Some("0/0"), &["PASS"], false), "REF_CALL");
        assert_eq!(filter_for(Some("0/0"), &["PASS"], true), "PASS");
        assert_eq!(filter_for(Some("1/1"), &[], false), "PASS");
        assert_eq!(filter_for(Some("1|1"), &["PASS"], false), "PASS");
        assert_eq!(filter_for(Some("2/2"), &["LowQual"], false), "FAIL_BUT_TEST");
        assert_eq!(filter_for(Some("1"), &[], false), "PASS");
    }

    #[test]
    fn test_existing_filter_kept() {
        let mut record = record(Some("1/1"), &[]);
        record.format.load(VFR_FILTER, "FAIL_CONFLICT".to_string());
        annotate_qc(&mut record, false);
        assert_eq!(record.format.get(VFR_FILTER), Some("FAIL_CONFLICT"));
        assert_eq!(record.format.updated().count(), 0);
    }
}

//! Per-record and summary statistics over annotated records.

use crate::eval::{
    Classification, FAIL_BUT_TEST, PASS, VFR_ALLELE_LEN, VFR_ALLELE_MATCH_COUNT,
    VFR_ALLELE_MATCH_FRAC, VFR_ED_TA, VFR_FILTER, VFR_RESULT,
};
use crate::utils::Result;
use crate::vcf::VariantRecord;
use itertools::Itertools;
use std::{fmt::Display, io::Write};

const NA: &str = "NA";
const COV_KEY: &str = "COV";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordStats {
    pub chrom: String,
    /// 1-based
    pub pos: usize,
    pub filter: Option<String>,
    pub result: Option<String>,
    pub allele_len: Option<usize>,
    pub match_count: Option<usize>,
    pub match_frac: Option<f64>,
    pub edit_dist: Option<usize>,
    pub frs: Option<f64>,
}

impl RecordStats {
    pub fn from_record(record: &VariantRecord) -> Self {
        let parsed = |key: &str| record.format.get(key).and_then(|v| v.parse().ok());
        RecordStats {
            chrom: record.chrom.clone(),
            pos: record.pos + 1,
            filter: record.format.get(VFR_FILTER).map(str::to_string),
            result: record.format.get(VFR_RESULT).map(str::to_string),
            allele_len: parsed(VFR_ALLELE_LEN),
            match_count: parsed(VFR_ALLELE_MATCH_COUNT),
            match_frac: record
                .format
                .get(VFR_ALLELE_MATCH_FRAC)
                .and_then(|v| v.parse().ok()),
            edit_dist: parsed(VFR_ED_TA),
            frs: frs_lookup(record),
        }
    }
}

/// Fraction of reads supporting the called allele. Uses `FRS` when the record
/// has it, otherwise infers it from per-allele coverage of a homozygous call.
/// None means there is not enough information.
pub fn frs_lookup(record: &VariantRecord) -> Option<f64> {
    match record.format.get("FRS") {
        Some(".") => None,
        Some(frs) => frs.parse().ok(),
        None => infer_frs_from_coverage(record, COV_KEY),
    }
}

fn infer_frs_from_coverage(record: &VariantRecord, cov_key: &str) -> Option<f64> {
    let coverage = record.format.get(cov_key)?;
    let alleles = record.genotype_alleles()?.into_iter().unique().collect_vec();
    let allele_index: usize = match alleles.as_slice() {
        [allele] if *allele != "." => allele.parse().ok()?,
        _ => return None,
    };
    let coverages: Vec<u64> = coverage
        .split(',')
        .map(|c| c.parse().ok())
        .collect::<Option<_>>()?;
    let total: u64 = coverages.iter().sum();
    if total == 0 {
        return Some(0.0);
    }
    coverages
        .get(allele_index)
        .map(|&cov| cov as f64 / total as f64)
}

/// Stats for every record, sorted by contig name then position.
pub fn per_record_stats<'a, I>(records: I) -> Vec<RecordStats>
where
    I: IntoIterator<Item = &'a VariantRecord>,
{
    let mut stats = records
        .into_iter()
        .map(RecordStats::from_record)
        .collect_vec();
    stats.sort_by(|a, b| a.chrom.cmp(&b.chrom).then(a.pos.cmp(&b.pos)));
    stats
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCounts {
    pub count: usize,
    pub sum_allele_match_frac: f64,
    pub sum_edit_dist: usize,
}

impl ResultCounts {
    fn add(&mut self, stats: &RecordStats) {
        self.count += 1;
        self.sum_allele_match_frac += stats.match_frac.unwrap_or(0.0);
        self.sum_edit_dist += stats.edit_dist.unwrap_or(0);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TpFpCounts {
    pub tp: ResultCounts,
    pub fp: ResultCounts,
}

impl TpFpCounts {
    fn add(&mut self, stats: &RecordStats) {
        if stats.result.as_deref() == Some(Classification::Tp.as_str()) {
            self.tp.add(stats);
        } else {
            self.fp.add(stats);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    /// Records not evaluated because of their filter.
    pub unused: usize,
    pub all: TpFpCounts,
    /// Records whose filter is PASS.
    pub filt: TpFpCounts,
}

pub fn summary_stats(per_record: &[RecordStats]) -> SummaryStats {
    let mut summary = SummaryStats::default();
    for stats in per_record {
        match stats.filter.as_deref() {
            Some(PASS) => {
                summary.all.add(stats);
                summary.filt.add(stats);
            }
            Some(FAIL_BUT_TEST) => summary.all.add(stats),
            _ => summary.unused += 1,
        }
    }
    summary
}

fn or_na<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| NA.to_string(), |v| v.to_string())
}

pub fn write_per_record_tsv<W: Write>(stats: &[RecordStats], mut writer: W) -> Result<()> {
    let io_err = |e: std::io::Error| format!("Failed to write per-record stats: {}", e);
    writeln!(
        writer,
        "CHROM\tPOS\tVFR_FILTER\tVFR_RESULT\tVFR_ALLELE_LEN\tVFR_ALLELE_MATCH_COUNT\tVFR_ALLELE_MATCH_FRAC\tVFR_ED_TA\tFRS"
    )
    .map_err(io_err)?;
    for s in stats {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            s.chrom,
            s.pos,
            or_na(&s.filter),
            or_na(&s.result),
            or_na(&s.allele_len),
            or_na(&s.match_count),
            or_na(&s.match_frac),
            or_na(&s.edit_dist),
            or_na(&s.frs)
        )
        .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

pub fn write_summary_tsv<W: Write>(summary: &SummaryStats, mut writer: W) -> Result<()> {
    let io_err = |e: std::io::Error| format!("Failed to write summary stats: {}", e);
    writeln!(writer, "Group\tResult\tCount\tSUM_ALLELE_MATCH_FRAC\tSUM_EDIT_DIST").map_err(io_err)?;
    writeln!(writer, "UNUSED\t{}\t{}\t{}\t{}", NA, summary.unused, NA, NA).map_err(io_err)?;
    for (group, counts) in [("ALL", &summary.all), ("FILT", &summary.filt)] {
        for (result, c) in [("TP", &counts.tp), ("FP", &counts.fp)] {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}",
                group, result, c.count, c.sum_allele_match_frac, c.sum_edit_dist
            )
            .map_err(io_err)?;
        }
    }
    writer.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chrom: &str, pos: usize, fields: &[(&str, &str)]) -> VariantRecord {
        let mut record = VariantRecord::new(chrom, pos, "A", &["G", "T"]);
        for (key, value) in fields {
            record.format.load(key, value.to_string());
        }
        record
    }

    #[test]
    fn test_frs_from_field() {
        assert_eq!(frs_lookup(&record("c", 0, &[("FRS", "0.75")])), Some(0.75));
        assert_eq!(frs_lookup(&record("c", 0, &[("FRS", "."), ("COV", "1,3")])), None);
    }

    #[test]
    fn test_frs_inferred_from_coverage() {
        let frs = |gt: &str, cov: &str| frs_lookup(&record("c", 0, &[("GT", gt), ("COV", cov)]));
        assert_eq!(frs("0/0", "1,3,0"), Some(0.25));
        assert_eq!(frs("2/2", "1,1,2"), Some(0.5));
        assert_eq!(frs("1/1", "0,0,0"), Some(0.0));
        assert_eq!(frs("0/1", "1,3,0"), None);
        assert_eq!(frs("./.", "1,3,0"), None);
        assert_eq!(frs("1/1", "."), None);
        assert_eq!(frs_lookup(&record("c", 0, &[("GT", "1/1")])), None);
    }

    #[test]
    fn test_per_record_sorted() {
        let records = vec![
            record("b", 5, &[(VFR_FILTER, "PASS")]),
            record("a", 10, &[(VFR_FILTER, "PASS"), (VFR_ALLELE_MATCH_FRAC, "0.5")]),
            record("a", 2, &[(VFR_FILTER, "HET")]),
        ];
        let stats = per_record_stats(&records);
        assert_eq!(
            stats.iter().map(|s| (s.chrom.as_str(), s.pos)).collect_vec(),
            vec![("a", 3), ("a", 11), ("b", 6)]
        );
        assert_eq!(stats[1].match_frac, Some(0.5));
        assert_eq!(stats[0].match_frac, None);
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(
                "a",
                1,
                &[
                    (VFR_FILTER, "PASS"),
                    (VFR_RESULT, "TP"),
                    (VFR_ALLELE_MATCH_FRAC, "1.0"),
                    (VFR_ED_TA, "0"),
                ],
            ),
            record(
                "a",
                2,
                &[
                    (VFR_FILTER, "FAIL_BUT_TEST"),
                    (VFR_RESULT, "Partial_TP"),
                    (VFR_ALLELE_MATCH_FRAC, "0.5"),
                    (VFR_ED_TA, "2"),
                ],
            ),
            record(
                "a",
                3,
                &[(VFR_FILTER, "PASS"), (VFR_RESULT, "FP_PROBE_UNMAPPED")],
            ),
            record("a", 4, &[(VFR_FILTER, "HET")]),
            record("a", 5, &[]),
        ];
        let summary = summary_stats(&per_record_stats(&records));
        assert_eq!(summary.unused, 2);
        assert_eq!(summary.all.tp.count, 1);
        assert_eq!(summary.all.fp.count, 2);
        assert_eq!(summary.all.fp.sum_allele_match_frac, 0.5);
        assert_eq!(summary.all.fp.sum_edit_dist, 2);
        assert_eq!(summary.filt.tp.count, 1);
        assert_eq!(summary.filt.fp.count, 1);
        assert_eq!(summary.filt.fp.sum_edit_dist, 0);

        let mut out = Vec::new();
        write_summary_tsv(&summary, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines = text.lines().collect_vec();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "UNUSED\tNA\t2\tNA\tNA");
        assert_eq!(lines[2], "ALL\tTP\t1\t1\t0");
        assert_eq!(lines[3], "ALL\tFP\t2\t0.5\t2");
    }

    #[test]
    fn test_write_per_record() {
        let records = vec![record("a", 0, &[(VFR_FILTER, "PASS"), ("FRS", "0.9")])];
        let mut out = Vec::new();
        write_per_record_tsv(&per_record_stats(&records), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("a\t1\tPASS\tNA\tNA\tNA\tNA\tNA\t0.9"));
    }
}

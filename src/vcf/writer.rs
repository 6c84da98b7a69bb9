use super::record::VariantRecord;
use crate::utils::Result;
use rust_htslib::bcf::{self, header::HeaderView, Format, HeaderRecord};
use std::{env, path::Path};

/// FORMAT definitions for every annotation the evaluation may write.
const ANNOTATION_LINES: [&str; 14] = [
    r#"##FORMAT=<ID=VFR_FILTER,Number=1,Type=String,Description="Filter assigned before probe mapping">"#,
    r#"##FORMAT=<ID=VFR_IN_MASK,Number=1,Type=String,Description="Whether or not the variant is in the truth genome mask">"#,
    r#"##FORMAT=<ID=VFR_RESULT,Number=1,Type=String,Description="FP, TP, or Partial_TP when part of the allele matches the truth reference">"#,
    r#"##FORMAT=<ID=VFR_ALLELE_LEN,Number=1,Type=String,Description="Number of positions in allele that were checked if they match the truth">"#,
    r#"##FORMAT=<ID=VFR_ALLELE_MATCH_COUNT,Number=1,Type=String,Description="Number of positions in allele that match the truth">"#,
    r#"##FORMAT=<ID=VFR_ALLELE_MATCH_FRAC,Number=1,Type=String,Description="Fraction of positions in allele that match the truth">"#,
    r#"##FORMAT=<ID=VFR_ED_RA,Number=1,Type=String,Description="Edit distance between ref and alt allele (using the called allele where more than one alt)">"#,
    r#"##FORMAT=<ID=VFR_ED_TR,Number=1,Type=String,Description="Edit distance between truth and ref allele">"#,
    r#"##FORMAT=<ID=VFR_ED_TA,Number=1,Type=String,Description="Edit distance between truth and alt allele">"#,
    r#"##FORMAT=<ID=VFR_ED_SCORE,Number=1,Type=String,Description="Edit distance score, 0 when the alt probe did not map">"#,
    r#"##FORMAT=<ID=VFR_REF_PROBE,Number=1,Type=String,Description="Probe sequence carrying the ref allele">"#,
    r#"##FORMAT=<ID=VFR_REF_PROBE_ALLELE_INTERVAL,Number=1,Type=String,Description="1-based interval of the ref allele in the ref probe">"#,
    r#"##FORMAT=<ID=VFR_ALT_PROBE,Number=1,Type=String,Description="Probe sequence carrying the called allele">"#,
    r#"##FORMAT=<ID=VFR_ALT_PROBE_ALLELE_INTERVAL,Number=1,Type=String,Description="1-based interval of the called allele in the alt probe">"#,
];

pub struct VcfWriter {
    writer: bcf::Writer,
}

impl VcfWriter {
    /// Opens `path` with the template's header plus the annotation definitions
    /// it does not already carry. Compression follows the file extension.
    pub fn new(path: &Path, template: &HeaderView) -> Result<Self> {
        let defined = defined_format_types(template);
        let mut header = bcf::Header::from_template(template);

        for line in ANNOTATION_LINES.iter() {
            let id = format_line_id(line);
            match defined.iter().find(|(key, _)| key == id) {
                None => {
                    header.push_record(line.as_bytes());
                }
                Some((_, field_type)) if field_type != "String" => {
                    return Err(format!(
                        "Input VCF defines FORMAT/{} with Type={}, expected String",
                        id, field_type
                    ));
                }
                Some(_) => {}
            }
        }

        let line = format!(
            "##{}Version={}",
            env!("CARGO_PKG_NAME"),
            *crate::cli::FULL_VERSION
        );
        header.push_record(line.as_bytes());

        let args: Vec<String> = env::args().collect();
        let command_line = args.join(" ");
        let line = format!("##{}Command={}", env!("CARGO_PKG_NAME"), command_line);
        header.push_record(line.as_bytes());

        let (is_uncompressed, format) = infer_output_type_from_extension(path);
        log::debug!(
            "Writing {} (uncompressed={})",
            path.display(),
            is_uncompressed
        );
        let writer = bcf::Writer::from_path(path, &header, is_uncompressed, format)
            .map_err(|e| format!("Invalid VCF output path {}: {}", path.display(), e))?;
        Ok(VcfWriter { writer })
    }

    /// Writes `record` with every FORMAT key updated on `variant` applied.
    pub fn write(&mut self, record: &mut bcf::Record, variant: &VariantRecord) -> Result<()> {
        self.writer.translate(record);
        for (key, value) in variant.format.updated() {
            record
                .push_format_string(key.as_bytes(), &[value.as_bytes()])
                .map_err(|e| {
                    format!(
                        "Failed to set FORMAT/{} at {}:{}: {}",
                        key,
                        variant.chrom,
                        variant.pos + 1,
                        e
                    )
                })?;
        }
        self.writer
            .write(record)
            .map_err(|e| format!("Failed to write VCF record: {}", e))
    }
}

fn format_line_id(line: &str) -> &str {
    line.split("ID=")
        .nth(1)
        .and_then(|rest| rest.split(',').next())
        .unwrap_or_default()
}

fn defined_format_types(header: &HeaderView) -> Vec<(String, String)> {
    header
        .header_records()
        .into_iter()
        .filter_map(|record| match record {
            HeaderRecord::Format { key: _, values } => {
                let id = values.get("ID")?.clone();
                let field_type = values.get("Type").cloned().unwrap_or_default();
                Some((id, field_type))
            }
            _ => None,
        })
        .collect()
}

fn infer_output_type_from_extension(path: &Path) -> (bool, Format) {
    let path_lower = path.to_string_lossy().to_lowercase();
    match path_lower.as_str() {
        s if s.ends_with(".bcf.gz") => (false, Format::Bcf),
        s if s.ends_with(".vcf.gz") || s.ends_with(".vcf.bgz") => (false, Format::Vcf),
        s if s.ends_with(".bcf") => (true, Format::Bcf),
        _ => (true, Format::Vcf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::VcfReader;
    use std::io::Write;

    const VCF: &str = "\
##fileformat=VCFv4.2
##contig=<ID=ref,length=100>
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
ref\t11\t.\tA\tG\t.\tPASS\t.\tGT:DP\t1/1:12
ref\t30\t.\tC\tT\t.\tPASS\t.\tGT:DP\t1/1:7
";

    #[test]
    fn test_infer_output_type() {
        assert!(matches!(
            infer_output_type_from_extension(Path::new("out.vcf.gz")),
            (false, Format::Vcf)
        ));
        assert!(matches!(
            infer_output_type_from_extension(Path::new("out.BCF")),
            (true, Format::Bcf)
        ));
        assert!(matches!(
            infer_output_type_from_extension(Path::new("out.txt")),
            (true, Format::Vcf)
        ));
    }

    #[test]
    fn test_format_line_id() {
        assert_eq!(format_line_id(ANNOTATION_LINES[0]), "VFR_FILTER");
        assert_eq!(format_line_id("##FORMAT=<Number=1>"), "");
    }

    #[test]
    fn test_write_updated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.vcf");
        std::fs::File::create(&input)
            .unwrap()
            .write_all(VCF.as_bytes())
            .unwrap();
        let output = dir.path().join("out.vcf");

        let mut reader = VcfReader::new(&input).unwrap();
        let mut writer = VcfWriter::new(&output, &reader.header).unwrap();
        for (i, (mut record, mut variant)) in reader.read_batch(10).unwrap().into_iter().enumerate()
        {
            if i == 0 {
                variant.format.set("VFR_RESULT", "TP");
                variant.format.set("VFR_ALLELE_MATCH_FRAC", "1.0");
            }
            writer.write(&mut record, &variant).unwrap();
        }
        drop(writer);

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("##FORMAT=<ID=VFR_RESULT"));
        assert!(written.contains("##varprobeVersion="));

        let mut reader = VcfReader::new(&output).unwrap();
        let batch = reader.read_batch(10).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].1.format.get("VFR_RESULT"), Some("TP"));
        assert_eq!(batch[0].1.format.get("VFR_ALLELE_MATCH_FRAC"), Some("1.0"));
        assert_eq!(batch[0].1.format.get("DP"), Some("12"));
        assert_eq!(batch[1].1.format.get("VFR_RESULT"), None);
        assert_eq!(batch[1].1.pos, 29);
    }

    #[test]
    fn test_rejects_conflicting_definition() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.vcf");
        let contents = VCF.replace(
            "##FORMAT=<ID=DP",
            "##FORMAT=<ID=VFR_ALLELE_LEN,Number=1,Type=Integer,Description=\"len\">\n##FORMAT=<ID=DP",
        );
        std::fs::write(&input, contents).unwrap();
        let reader = VcfReader::new(&input).unwrap();
        assert!(VcfWriter::new(&dir.path().join("out.vcf"), &reader.header).is_err());
    }
}

use super::record::{FormatFields, VariantRecord};
use crate::utils::Result;
use itertools::Itertools;
use once_cell::sync::Lazy;
use rust_htslib::bcf::{self, header::HeaderView, HeaderRecord, Read};
use std::path::Path;

const MISSING_INTEGER: i32 = i32::MIN;
const VECTOR_END_INTEGER: i32 = i32::MIN + 1;
static MISSING_FLOAT: Lazy<f32> = Lazy::new(|| f32::from_bits(0x7F80_0001));
static VECTOR_END_FLOAT: Lazy<f32> = Lazy::new(|| f32::from_bits(0x7F80_0002));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Genotype,
    String,
    Integer,
    Float,
}

pub struct VcfReader {
    reader: bcf::Reader,
    pub header: HeaderView,
    format_fields: Vec<(String, FieldType)>,
}

impl VcfReader {
    pub fn new(path: &Path) -> Result<Self> {
        log::info!("Start loading VCF {:?}", path);
        let reader = bcf::Reader::from_path(path)
            .map_err(|e| format!("Failed to open VCF file {}: {}", path.display(), e))?;
        let header = reader.header().clone();

        if header.sample_count() != 1 {
            return Err(format!(
                "Unsupported: VCF file must have exactly one sample, found {}: {}",
                header.sample_count(),
                path.display()
            ));
        }

        let format_fields = get_format_fields(&header);
        log::debug!(
            "{:?} defines FORMAT fields: {}",
            path.file_name().unwrap_or_default(),
            format_fields.iter().map(|(id, _)| id).join(",")
        );

        Ok(VcfReader {
            reader,
            header,
            format_fields,
        })
    }

    /// Reads the next record, returning the raw record alongside its parsed view.
    pub fn read_record(&mut self) -> Result<Option<(bcf::Record, VariantRecord)>> {
        let mut record = self.reader.empty_record();
        match self.reader.read(&mut record) {
            None => Ok(None),
            Some(Err(e)) => Err(format!("Failed to read VCF record: {}", e)),
            Some(Ok(())) => {
                let variant = self.to_variant(&record)?;
                Ok(Some((record, variant)))
            }
        }
    }

    pub fn read_batch(&mut self, batch_size: usize) -> Result<Vec<(bcf::Record, VariantRecord)>> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.read_record()? {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        Ok(batch)
    }

    fn to_variant(&self, record: &bcf::Record) -> Result<VariantRecord> {
        let rid = record
            .rid()
            .ok_or_else(|| format!("Record at position {} has no contig", record.pos() + 1))?;
        let chrom = self
            .header
            .rid2name(rid)
            .map_err(|e| format!("Unknown contig id {}: {}", rid, e))?;
        let chrom = String::from_utf8_lossy(chrom).into_owned();

        let alleles = record.alleles();
        let (ref_allele, alts) = match alleles.split_first() {
            Some((ref_allele, alts)) => (
                allele_string(ref_allele),
                alts.iter().map(|a| allele_string(a)).collect(),
            ),
            None => return Err(format!("Record at {}:{} has no alleles", chrom, record.pos() + 1)),
        };

        let filters = record
            .filters()
            .map(|id| String::from_utf8_lossy(&self.header.id_to_name(id)).into_owned())
            .collect();

        let mut format = FormatFields::default();
        for (id, field_type) in &self.format_fields {
            if let Some(value) = format_value(record, id, *field_type) {
                format.load(id, value);
            }
        }

        Ok(VariantRecord {
            chrom,
            pos: record.pos() as usize,
            ref_allele,
            alts,
            filters,
            format,
        })
    }
}

/// Alleles are compared against uppercased sequence stores.
fn allele_string(allele: &[u8]) -> String {
    String::from_utf8_lossy(allele).to_ascii_uppercase()
}

/// FORMAT fields declared in the header, GT first.
fn get_format_fields(header: &HeaderView) -> Vec<(String, FieldType)> {
    let mut fields = Vec::new();
    for record in header.header_records() {
        if let HeaderRecord::Format { key: _, values } = record {
            let Some(id) = values.get("ID") else {
                continue;
            };
            let field_type = if id == "GT" {
                FieldType::Genotype
            } else {
                match values.get("Type").map(|t| t.as_str()) {
                    Some("Integer") => FieldType::Integer,
                    Some("Float") => FieldType::Float,
                    _ => FieldType::String,
                }
            };
            fields.push((id.clone(), field_type));
        }
    }
    fields.sort_by_key(|(_, field_type)| *field_type != FieldType::Genotype);
    fields
}

/// Renders the first sample's value for a FORMAT tag, or None if the record lacks it.
fn format_value(record: &bcf::Record, id: &str, field_type: FieldType) -> Option<String> {
    let tag = id.as_bytes();
    match field_type {
        FieldType::Genotype => {
            let genotypes = record.genotypes().ok()?;
            Some(genotypes.get(0).to_string())
        }
        FieldType::String => {
            let values = record.format(tag).string().ok()?;
            values
                .first()
                .map(|v| String::from_utf8_lossy(v).into_owned())
        }
        FieldType::Integer => {
            let values = record.format(tag).integer().ok()?;
            let sample = values.first()?;
            Some(render_values(
                sample.iter().take_while(|&&v| v != VECTOR_END_INTEGER),
                |&v| {
                    if v == MISSING_INTEGER {
                        ".".to_string()
                    } else {
                        v.to_string()
                    }
                },
            ))
        }
        FieldType::Float => {
            let values = record.format(tag).float().ok()?;
            let sample = values.first()?;
            Some(render_values(
                sample
                    .iter()
                    .take_while(|v| v.to_bits() != VECTOR_END_FLOAT.to_bits()),
                |v| {
                    if v.to_bits() == MISSING_FLOAT.to_bits() {
                        ".".to_string()
                    } else {
                        v.to_string()
                    }
                },
            ))
        }
    }
}

fn render_values<'a, T: 'a, I, F>(values: I, render: F) -> String
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> String,
{
    let rendered = values.map(render).join(",");
    if rendered.is_empty() {
        ".".to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VCF: &str = "\
##fileformat=VCFv4.2
##contig=<ID=ref,length=100>
##FILTER=<ID=PASS,Description=\"All filters passed\">
##FILTER=<ID=LowQual,Description=\"Low quality\">
##FORMAT=<ID=COV,Number=R,Type=Integer,Description=\"Coverage\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=FRS,Number=1,Type=Float,Description=\"Fraction of reads supporting\">
##FORMAT=<ID=VFR_FILTER,Number=1,Type=String,Description=\"QC filter\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
ref\t11\t.\tA\tG,T\t.\tPASS\t.\tGT:COV:FRS\t2/2:1,0,5:0.833
ref\t20\t.\tAC\tA\t.\tLowQual\t.\tGT:COV:VFR_FILTER\t1/1:.:FAIL_BUT_TEST
";

    fn write_vcf(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".vcf").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_records() {
        let file = write_vcf(VCF);
        let mut reader = VcfReader::new(file.path()).unwrap();
        let batch = reader.read_batch(10).unwrap();
        assert_eq!(batch.len(), 2);

        let first = &batch[0].1;
        assert_eq!(first.chrom, "ref");
        assert_eq!(first.pos, 10);
        assert_eq!(first.ref_allele, "A");
        assert_eq!(first.alts, vec!["G", "T"]);
        assert_eq!(first.filters, vec!["PASS"]);
        assert_eq!(first.genotype(), Some("2/2"));
        assert_eq!(first.format.get("COV"), Some("1,0,5"));
        assert_eq!(first.format.get("FRS"), Some("0.833"));
        assert_eq!(first.format.get("VFR_FILTER"), None);
        assert_eq!(first.format.iter().next().map(|(k, _)| k), Some("GT"));

        let second = &batch[1].1;
        assert_eq!(second.filters, vec!["LowQual"]);
        assert_eq!(second.format.get("COV"), Some("."));
        assert_eq!(second.format.get("VFR_FILTER"), Some("FAIL_BUT_TEST"));
        assert_eq!(second.format.updated().count(), 0);

        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_alleles_uppercased() {
        let file = write_vcf(&VCF.replace("\tA\tG,T\t", "\ta\tg,t\t"));
        let mut reader = VcfReader::new(file.path()).unwrap();
        let (_, first) = reader.read_record().unwrap().unwrap();
        assert_eq!(first.ref_allele, "A");
        assert_eq!(first.alts, vec!["G", "T"]);
    }

    #[test]
    fn test_rejects_multi_sample() {
        let contents = VCF
            .replace("FORMAT\tsample", "FORMAT\tsample\tother")
            .replace("0.833\n", "0.833\t0/0:1,1,1:0.5\n")
            .replace("FAIL_BUT_TEST\n", "FAIL_BUT_TEST\t0/0:.:PASS\n");
        let file = write_vcf(&contents);
        assert!(VcfReader::new(file.path()).is_err());
    }
}

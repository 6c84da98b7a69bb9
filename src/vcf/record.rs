use crate::utils::Result;
use itertools::Itertools;
use std::fmt;

/// FORMAT values of the single sample, in input order, with the keys set
/// since loading tracked so the writer only touches those.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatFields {
    entries: Vec<(String, String)>,
    updated: Vec<String>,
}

impl FormatFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        if !self.updated.iter().any(|k| k == key) {
            self.updated.push(key.to_string());
        }
    }

    /// Inserts a value as read from the input; not reported as updated.
    pub(crate) fn load(&mut self, key: &str, value: String) {
        self.entries.push((key.to_string(), value));
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.updated.retain(|k| k != key);
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Updated keys in the order they were first set.
    pub fn updated(&self) -> impl Iterator<Item = (&str, &str)> {
        self.updated
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.as_str(), value)))
    }
}

/// Owned view of a single-sample VCF record.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    /// 0-based
    pub pos: usize,
    pub ref_allele: String,
    pub alts: Vec<String>,
    pub filters: Vec<String>,
    pub format: FormatFields,
}

impl VariantRecord {
    pub fn new(chrom: &str, pos: usize, ref_allele: &str, alts: &[&str]) -> Self {
        VariantRecord {
            chrom: chrom.to_string(),
            pos,
            ref_allele: ref_allele.to_string(),
            alts: alts.iter().map(|a| a.to_string()).collect(),
            filters: Vec::new(),
            format: FormatFields::default(),
        }
    }

    /// 0-based position of the last reference base.
    pub fn ref_end_pos(&self) -> usize {
        self.pos + self.ref_allele.len().max(1) - 1
    }

    pub fn genotype(&self) -> Option<&str> {
        self.format.get("GT")
    }

    /// Allele indices of GT as written, split on either separator.
    pub fn genotype_alleles(&self) -> Option<Vec<&str>> {
        self.genotype().map(|gt| gt.split(['/', '|']).collect())
    }

    /// Index of the first allele in GT.
    pub fn called_allele_index(&self) -> Result<usize> {
        let gt = self.genotype().ok_or_else(|| {
            format!("Missing GT at {}:{}", self.chrom, self.pos + 1)
        })?;
        gt.split(['/', '|'])
            .next()
            .and_then(|first| first.parse::<usize>().ok())
            .ok_or_else(|| format!("Malformed GT '{}' at {}:{}", gt, self.chrom, self.pos + 1))
    }

    /// Allele string for an index where 0 is REF.
    pub fn allele(&self, index: usize) -> Result<&str> {
        if index == 0 {
            return Ok(&self.ref_allele);
        }
        self.alts
            .get(index - 1)
            .map(|a| a.as_str())
            .ok_or_else(|| {
                format!(
                    "Allele index {} out of range at {}:{} ({} ALT alleles)",
                    index,
                    self.chrom,
                    self.pos + 1,
                    self.alts.len()
                )
            })
    }

    pub fn filter_string(&self) -> String {
        if self.filters.is_empty() {
            ".".to_string()
        } else {
            self.filters.join(";")
        }
    }
}

impl fmt::Display for VariantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alts = if self.alts.is_empty() {
            ".".to_string()
        } else {
            self.alts.join(",")
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.pos + 1,
            self.ref_allele,
            alts,
            self.filter_string(),
            self.format.iter().map(|(k, _)| k).join(":"),
            self.format.iter().map(|(_, v)| v).join(":")
        )
    }
}

use super::{open_text_reader, Result};
use bio::io::fasta;
use std::{collections::HashMap, path::Path};

/// Named nucleotide sequences held in memory, uppercased on load.
///
/// Loaded once per run and shared read-only between workers.
#[derive(Debug, Default, Clone)]
pub struct SequenceStore {
    names: Vec<String>,
    seqs: HashMap<String, String>,
}

impl SequenceStore {
    pub fn from_fasta(path: &Path) -> Result<Self> {
        log::debug!("Loading sequences from {}", path.display());
        let reader = fasta::Reader::new(open_text_reader(path)?);
        let mut store = SequenceStore::default();
        for result in reader.records() {
            let record = result
                .map_err(|e| format!("Error reading FASTA {}: {}", path.display(), e))?;
            let seq = std::str::from_utf8(record.seq())
                .map_err(|e| format!("Non-UTF8 sequence {}: {}", record.id(), e))?
                .to_uppercase();
            store.insert(record.id(), seq)?;
        }
        if store.is_empty() {
            return Err(format!("No sequences found in {}", path.display()));
        }
        log::debug!(
            "Loaded {} sequences from {}",
            store.names.len(),
            path.display()
        );
        Ok(store)
    }

    fn insert(&mut self, name: &str, seq: String) -> Result<()> {
        if self.seqs.contains_key(name) {
            return Err(format!("Duplicate sequence name: {}", name));
        }
        self.names.push(name.to_string());
        self.seqs.insert(name.to_string(), seq);
        Ok(())
    }

    /// Fetches a sequence by name. A missing name means the inputs disagree
    /// on contig naming, which no record can recover from.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.seqs
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| format!("Sequence '{}' not found in FASTA", name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over (name, sequence) in FASTA order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .map(move |name| (name.as_str(), self.seqs[name].as_str()))
    }
}

impl<N: Into<String>, S: Into<String>> FromIterator<(N, S)> for SequenceStore {
    fn from_iter<I: IntoIterator<Item = (N, S)>>(iter: I) -> Self {
        let mut store = SequenceStore::default();
        for (name, seq) in iter {
            let name = name.into();
            if !store.seqs.contains_key(&name) {
                store.names.push(name.clone());
            }
            store.seqs.insert(name, seq.into().to_uppercase());
        }
        store
    }
}

use crate::utils::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: u64,
    pub contig: u32,
    pub pos: u32,
}

/// (k, w) minimizer index over the forward strand of a set of sequences.
#[derive(Debug)]
pub struct MinimizerIndex {
    kmer_len: usize,
    window: usize,
    entries: Vec<IndexEntry>,
}

impl MinimizerIndex {
    pub fn new<'a, I>(seqs: I, kmer_len: usize, window: usize) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        if !(1..=31).contains(&kmer_len) {
            return Err(format!("k-mer length must be in 1..=31, got {}", kmer_len));
        }
        if window == 0 {
            return Err("Minimizer window must be at least 1".into());
        }

        let mut entries = Vec::new();
        for (contig, seq) in seqs.into_iter().enumerate() {
            if u32::try_from(seq.len()).is_err() {
                return Err(format!(
                    "Sequence {} is too long to index ({} bp)",
                    contig,
                    seq.len()
                ));
            }
            entries.extend(
                minimizers(seq, kmer_len, window)
                    .into_iter()
                    .map(|(hash, pos)| IndexEntry {
                        hash,
                        contig: contig as u32,
                        pos: pos as u32,
                    }),
            );
        }
        entries.sort_unstable_by_key(|e| (e.hash, e.contig, e.pos));
        log::debug!("Indexed {} minimizers (k={}, w={})", entries.len(), kmer_len, window);

        Ok(MinimizerIndex {
            kmer_len,
            window,
            entries,
        })
    }

    pub fn kmer_len(&self) -> usize {
        self.kmer_len
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn lookup(&self, hash: u64) -> &[IndexEntry] {
        let start = self.entries.partition_point(|e| e.hash < hash);
        let end = self.entries.partition_point(|e| e.hash <= hash);
        &self.entries[start..end]
    }
}

#[inline]
fn encode_base(base: u8) -> Option<u64> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Invertible integer hash so that minimizers are not biased towards poly-A.
#[inline]
fn hash64(key: u64, mask: u64) -> u64 {
    let mut key = (!key).wrapping_add(key << 21) & mask;
    key ^= key >> 24;
    key = key.wrapping_add(key << 3).wrapping_add(key << 8) & mask;
    key ^= key >> 14;
    key = key.wrapping_add(key << 2).wrapping_add(key << 4) & mask;
    key ^= key >> 28;
    key.wrapping_add(key << 31) & mask
}

/// Minimizers of `seq` as (hash, k-mer start). Stretches of valid bases shorter
/// than a full window still contribute their smallest k-mer.
pub fn minimizers(seq: &[u8], kmer_len: usize, window: usize) -> Vec<(u64, usize)> {
    let mask = (1u64 << (2 * kmer_len)) - 1;
    let mut out = Vec::new();
    let mut run = Vec::new();
    let mut kmer = 0u64;
    let mut valid = 0usize;

    for (i, &base) in seq.iter().enumerate() {
        match encode_base(base) {
            Some(code) => {
                kmer = ((kmer << 2) | code) & mask;
                valid += 1;
                if valid >= kmer_len {
                    run.push((hash64(kmer, mask), i + 1 - kmer_len));
                }
            }
            None => {
                pick_window_minima(&run, window, &mut out);
                run.clear();
                kmer = 0;
                valid = 0;
            }
        }
    }
    pick_window_minima(&run, window, &mut out);
    out
}

fn pick_window_minima(run: &[(u64, usize)], window: usize, out: &mut Vec<(u64, usize)>) {
    if run.is_empty() {
        return;
    }
    let window = window.min(run.len());
    let mut last_pos = None;
    for kmers in run.windows(window) {
        if let Some(&(hash, pos)) = kmers.iter().min_by_key(|(hash, _)| *hash) {
            if last_pos != Some(pos) {
                out.push((hash, pos));
                last_pos = Some(pos);
            }
        }
    }
}

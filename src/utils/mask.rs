use super::{open_text_reader, Result};
use std::{collections::HashMap, io::BufRead, path::Path};

/// Sorted, non-overlapping half-open intervals of masked positions on one contig.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaskedIntervals {
    intervals: Vec<(u32, u32)>,
}

impl MaskedIntervals {
    fn from_unsorted(mut intervals: Vec<(u32, u32)>) -> Self {
        intervals.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        MaskedIntervals { intervals: merged }
    }

    pub fn contains(&self, pos: usize) -> bool {
        let pos = match u32::try_from(pos) {
            Ok(pos) => pos,
            Err(_) => return false,
        };
        let idx = self.intervals.partition_point(|&(_, end)| end <= pos);
        self.intervals
            .get(idx)
            .is_some_and(|&(start, _)| start <= pos)
    }

    pub fn num_positions(&self) -> u64 {
        self.intervals
            .iter()
            .map(|&(start, end)| (end - start) as u64)
            .sum()
    }
}

/// Positions of the truth genome excluded from confident comparison, per contig.
#[derive(Debug, Default, Clone)]
pub struct TruthMask {
    contigs: HashMap<String, MaskedIntervals>,
}

impl TruthMask {
    pub fn from_bed(path: &Path) -> Result<Self> {
        let reader = open_text_reader(path)?;
        let mask = Self::from_reader(reader)
            .map_err(|e| format!("Mask {}: {}", path.display(), e))?;
        log::info!(
            "Loaded truth mask covering {} positions on {} contigs",
            mask.contigs
                .values()
                .map(|m| m.num_positions())
                .sum::<u64>(),
            mask.contigs.len()
        );
        Ok(mask)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut raw: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| format!("Error reading line {}: {}", line_number + 1, e))?;
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with("track")
                || line.starts_with("browser")
            {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (chrom, start, end) = match (parts.next(), parts.next(), parts.next()) {
                (Some(chrom), Some(start), Some(end)) => (chrom, start, end),
                _ => {
                    return Err(format!(
                        "Expected 'chrom start end' at line {}: {}",
                        line_number + 1,
                        line
                    ))
                }
            };
            let parse = |s: &str| {
                s.parse::<u32>()
                    .map_err(|_| format!("Invalid coordinate at line {}: {}", line_number + 1, s))
            };
            let (start, end) = (parse(start)?, parse(end)?);
            if start >= end {
                return Err(format!(
                    "Invalid interval at line {}: start {} >= end {}",
                    line_number + 1,
                    start,
                    end
                ));
            }
            raw.entry(chrom.to_string()).or_default().push((start, end));
        }

        let contigs = raw
            .into_iter()
            .map(|(chrom, intervals)| (chrom, MaskedIntervals::from_unsorted(intervals)))
            .collect();
        Ok(TruthMask { contigs })
    }

    /// Masked intervals of a contig; contigs absent from the BED have none.
    pub fn for_contig(&self, contig: &str) -> Option<&MaskedIntervals> {
        self.contigs.get(contig)
    }

    #[cfg(test)]
    pub fn from_positions(contig: &str, positions: &[u32]) -> Self {
        let intervals = positions.iter().map(|&p| (p, p + 1)).collect();
        let mut contigs = HashMap::new();
        contigs.insert(contig.to_string(), MaskedIntervals::from_unsorted(intervals));
        TruthMask { contigs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_from_reader() {
        let data = "\
# comment\n\
truth\t10\t20\n\
truth\t15\t25\n\
truth\t40\t41\n\
other\t0\t1\n";
        let mask = TruthMask::from_reader(std::io::Cursor::new(data)).unwrap();
        let truth = mask.for_contig("truth").unwrap();
        assert!(!truth.contains(9));
        assert!(truth.contains(10));
        assert!(truth.contains(24));
        assert!(!truth.contains(25));
        assert!(truth.contains(40));
        assert!(!truth.contains(41));
        assert_eq!(truth.num_positions(), 16);
        assert!(mask.for_contig("other").unwrap().contains(0));
        assert!(mask.for_contig("missing").is_none());
    }

    #[test]
    fn test_mask_from_reader_incomplete_line() {
        let data = "truth\t10\n";
        assert!(TruthMask::from_reader(std::io::Cursor::new(data)).is_err());
    }

    #[test]
    fn test_mask_from_reader_invalid_interval() {
        let data = "truth\t10\t10\n";
        assert!(TruthMask::from_reader(std::io::Cursor::new(data)).is_err());
    }

    #[test]
    fn test_mask_from_positions() {
        let mask = TruthMask::from_positions("truth", &[59, 3, 4]);
        let truth = mask.for_contig("truth").unwrap();
        assert!(truth.contains(59));
        assert!(truth.contains(3));
        assert!(truth.contains(4));
        assert!(!truth.contains(5));
    }
}

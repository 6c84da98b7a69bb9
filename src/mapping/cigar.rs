use itertools::Itertools;

pub type CigarOp = rust_htslib::bam::record::Cigar;

pub trait CigarOpExt {
    fn get_ref_len(&self) -> usize;
    fn get_query_len(&self) -> usize;
    fn edit_count(&self) -> usize;
}

impl CigarOpExt for CigarOp {
    fn get_ref_len(&self) -> usize {
        match self {
            CigarOp::Match(len)
            | CigarOp::RefSkip(len)
            | CigarOp::Del(len)
            | CigarOp::Equal(len)
            | CigarOp::Diff(len) => *len as usize,
            CigarOp::Ins(_) | CigarOp::SoftClip(_) | CigarOp::HardClip(_) | CigarOp::Pad(_) => 0,
        }
    }

    fn get_query_len(&self) -> usize {
        match self {
            CigarOp::Match(len)
            | CigarOp::Equal(len)
            | CigarOp::Diff(len)
            | CigarOp::Ins(len)
            | CigarOp::SoftClip(len) => *len as usize,
            CigarOp::RefSkip(_) | CigarOp::Del(_) | CigarOp::HardClip(_) | CigarOp::Pad(_) => 0,
        }
    }

    /// Contribution of the operation to NM.
    fn edit_count(&self) -> usize {
        match self {
            CigarOp::Diff(len) | CigarOp::Ins(len) | CigarOp::Del(len) => *len as usize,
            _ => 0,
        }
    }
}

/// Renders ops as an extended CIGAR string, e.g. `10=1X5=2D3=`.
pub fn cigar_to_string(ops: &[CigarOp]) -> String {
    ops.iter().map(|op| op.to_string()).join("")
}

/// Parses an extended CIGAR string. Only `=`, `X`, `I` and `D` are accepted
/// because probe hits must distinguish matches from mismatches.
pub fn parse_extended_cigar(encoding: &str) -> Result<Vec<CigarOp>, String> {
    let mut ops = Vec::new();
    let mut len_digits = String::new();
    for c in encoding.chars() {
        if c.is_ascii_digit() {
            len_digits.push(c);
            continue;
        }
        let len: u32 = len_digits
            .parse()
            .map_err(|_| format!("Invalid CIGAR length in '{}'", encoding))?;
        len_digits.clear();
        let op = match c {
            '=' => CigarOp::Equal(len),
            'X' => CigarOp::Diff(len),
            'I' => CigarOp::Ins(len),
            'D' => CigarOp::Del(len),
            _ => {
                return Err(format!(
                    "Unsupported operation '{}' in extended CIGAR '{}'",
                    c, encoding
                ))
            }
        };
        ops.push(op);
    }
    if !len_digits.is_empty() {
        return Err(format!("Trailing length in CIGAR '{}'", encoding));
    }
    Ok(ops)
}

/// Appends an op, merging it into the previous one when both have the same kind.
pub fn push_op(ops: &mut Vec<CigarOp>, op: CigarOp) {
    let merged = match (ops.last(), &op) {
        (Some(CigarOp::Equal(a)), CigarOp::Equal(b)) => Some(CigarOp::Equal(a + b)),
        (Some(CigarOp::Diff(a)), CigarOp::Diff(b)) => Some(CigarOp::Diff(a + b)),
        (Some(CigarOp::Ins(a)), CigarOp::Ins(b)) => Some(CigarOp::Ins(a + b)),
        (Some(CigarOp::Del(a)), CigarOp::Del(b)) => Some(CigarOp::Del(a + b)),
        _ => None,
    };
    match merged {
        Some(merged) => {
            if let Some(last) = ops.last_mut() {
                *last = merged;
            }
        }
        None => ops.push(op),
    }
}

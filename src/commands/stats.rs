use crate::cli::StatsArgs;
use crate::stats::{per_record_stats, summary_stats, write_per_record_tsv, write_summary_tsv};
use crate::utils::{create_writer, format_number_with_commas, Result};
use crate::vcf::VcfReader;
use std::{fs::File, io::BufWriter};

pub fn stats(args: StatsArgs) -> Result<()> {
    let mut reader = VcfReader::new(&args.vcf_path)?;
    let mut records = Vec::new();
    while let Some((_, variant)) = reader.read_record()? {
        records.push(variant);
    }
    log::info!("Read {} records", format_number_with_commas(records.len()));

    let per_record = per_record_stats(&records);
    let summary = summary_stats(&per_record);

    let out = create_writer(&args.output_prefix, "per_record.tsv", open_tsv)?;
    write_per_record_tsv(&per_record, out)?;
    let out = create_writer(&args.output_prefix, "summary.tsv", open_tsv)?;
    write_summary_tsv(&summary, out)?;

    log::info!(
        "Unused: {}, evaluated: {} ({} PASS)",
        format_number_with_commas(summary.unused),
        format_number_with_commas(summary.all.tp.count + summary.all.fp.count),
        format_number_with_commas(summary.filt.tp.count + summary.filt.fp.count)
    );
    Ok(())
}

fn open_tsv(path: &str) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| e.to_string())
}

use crate::cli::AnnotateArgs;
use crate::eval::{
    annotate_qc, evaluate_record, probe_stream, Classification, Diagnostics, EvalContext,
    EvalParams, WantedFilters,
};
use crate::mapping::{MapParams, TruthMapper};
use crate::utils::{format_number_with_commas, Result, SequenceStore, TruthMask};
use crate::vcf::{VariantRecord, VcfReader, VcfWriter};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{IntoParallelRefMutIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    thread,
};

const CHANNEL_BUFFER_SIZE: usize = 2048;

/// Annotates the input VCF. A failed run leaves no output VCF behind.
pub fn annotate(args: AnnotateArgs) -> Result<()> {
    annotate_records(&args).inspect_err(|_| remove_partial_output(&args.output_path))
}

fn remove_partial_output(path: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => log::warn!("Removed incomplete output {}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove incomplete output {}: {}", path, e),
    }
}

fn annotate_records(args: &AnnotateArgs) -> Result<()> {
    log::info!("Loading reference {}", args.vcf_ref_path.display());
    let ref_seqs = SequenceStore::from_fasta(&args.vcf_ref_path)?;
    log::info!("Loading truth {}", args.truth_path.display());
    let truth = SequenceStore::from_fasta(&args.truth_path)?;

    let truth_mask = match &args.truth_mask_path {
        Some(path) => Some(TruthMask::from_bed(path)?),
        None => None,
    };

    let map_params = MapParams {
        scoring: args.map_scoring,
        kmer_len: args.kmer_len,
        window: args.minimizer_window,
        bandwidth: args.bandwidth,
        min_score: args.min_map_score,
        ..MapParams::default()
    };
    log::info!("Indexing truth ({} contigs)", truth.len());
    let mapper = TruthMapper::new(&truth, map_params)?;

    let mut reader = VcfReader::new(&args.vcf_path)?;
    let mut writer = VcfWriter::new(Path::new(&args.output_path), &reader.header)?;

    let wanted = WantedFilters::new(args.use_fail_conflict);
    let ctx = EvalContext {
        mapper: &mapper,
        truth: &truth,
        truth_mask: truth_mask.as_ref(),
        params: EvalParams {
            wanted,
            output_probes: args.output_probes,
        },
    };

    let (sender_log, map_log_thread) = match &args.map_log_path {
        Some(path) => {
            let (sender, thread) = spawn_map_log_writer(path)?;
            (Some(sender), Some(thread))
        }
        None => (None, None),
    };

    log::debug!(
        "Initializing thread pool with {} threads...",
        args.num_threads
    );
    let pool = initialize_thread_pool(args.num_threads)?;

    let mut num_records = 0;
    let mut num_evaluated = 0;
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    loop {
        let batch = reader.read_batch(args.batch_size)?;
        if batch.is_empty() {
            break;
        }
        let (mut raw_records, variants): (Vec<_>, Vec<VariantRecord>) = batch.into_iter().unzip();
        let variants = variants.into_iter().map(|mut variant| {
            annotate_qc(&mut variant, args.use_ref_calls);
            variant
        });
        let mut jobs = probe_stream(variants, &ref_seqs, args.flank_len, &wanted)
            .collect::<Result<Vec<_>>>()?;

        let outcomes = pool.install(|| {
            jobs.par_iter_mut()
                .map(|(variant, probes)| {
                    let mut diagnostics = Diagnostics::new(sender_log.is_some());
                    let result = evaluate_record(&ctx, variant, probes.as_ref(), &mut diagnostics)?;
                    Ok((result, diagnostics.into_lines()))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        for ((raw, (variant, _)), (result, lines)) in
            raw_records.iter_mut().zip(&jobs).zip(outcomes)
        {
            if let Some(sender) = &sender_log {
                if !lines.is_empty() && sender.send(lines).is_err() {
                    return Err("Map log writer stopped unexpectedly".to_string());
                }
            }
            writer.write(raw, variant)?;
            if let Some(result) = result {
                num_evaluated += 1;
                *counts.entry(result.as_str()).or_default() += 1;
            }
        }

        num_records += jobs.len();
        log::info!(
            "Processed {} records ({} evaluated)",
            format_number_with_commas(num_records),
            format_number_with_commas(num_evaluated)
        );
    }

    drop(sender_log);
    if let Some(handle) = map_log_thread {
        handle
            .join()
            .map_err(|_| "Map log writer thread panicked".to_string())??;
        log::trace!("Map log writer thread finished");
    }

    log_summary(num_records, &counts);
    Ok(())
}

fn log_summary(num_records: usize, counts: &BTreeMap<&'static str, usize>) {
    log::info!("Total records: {}", format_number_with_commas(num_records));
    for result in [
        Classification::Tp,
        Classification::PartialTp,
        Classification::Fp,
        Classification::RefProbeBetterMatch,
        Classification::ProbeUnmapped,
    ] {
        let count = counts.get(result.as_str()).copied().unwrap_or(0);
        log::info!("{}: {}", result, format_number_with_commas(count));
    }
}

type MapLogThread = thread::JoinHandle<Result<()>>;

fn spawn_map_log_writer(path: &str) -> Result<(Sender<Vec<String>>, MapLogThread)> {
    let file = File::create(path).map_err(|e| format!("Failed to create {}: {}", path, e))?;
    let mut out = BufWriter::new(file);
    let (sender, receiver) = bounded::<Vec<String>>(CHANNEL_BUFFER_SIZE);
    let handle = thread::spawn(move || {
        let io_err = |e: std::io::Error| format!("Failed to write map log: {}", e);
        for lines in &receiver {
            for line in lines {
                writeln!(out, "{}", line).map_err(io_err)?;
            }
        }
        out.flush().map_err(io_err)
    });
    Ok((sender, handle))
}

fn initialize_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("varprobe-{}", i))
        .start_handler(|_thread_index| {
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use qrs_detect::batch::{detect_batch, Recording};
use qrs_detect::config::{Args, DetectorConfig, Domain};
use qrs_detect::data_loading::{collect_inputs, read_signal_csv, record_name};
use qrs_detect::output::{write_peak_list, RecordSummary};
use qrs_detect::refine::refine_peaks;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };

    let inputs = collect_inputs(&args.input_path)
        .with_context(|| format!("Failed to list inputs in {}", args.input_path.display()))?;
    if inputs.is_empty() {
        warn!("No CSV files found in {}", args.input_path.display());
    }

    let mut summaries = Vec::new();
    let mut recordings = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let name = record_name(path);
        match read_signal_csv(path, args.column, args.has_headers) {
            Ok(samples) => recordings.push(Recording {
                name,
                samples,
                fs: args.fs,
            }),
            Err(e) => {
                error!("Skipping {}: {:#}", path.display(), e);
                summaries.push(failed_summary(&args, name, 0, format!("{:#}", e)));
            }
        }
    }

    let outcomes = detect_batch(&recordings, &config);

    for (recording, outcome) in recordings.iter().zip(outcomes) {
        let detection = match outcome.result {
            Ok(detection) => detection,
            Err(e) => {
                summaries.push(failed_summary(
                    &args,
                    outcome.name,
                    recording.samples.len(),
                    e.to_string(),
                ));
                continue;
            }
        };

        let track = match args.domain {
            Domain::Band => &detection.band_limited,
            Domain::Integrated => &detection.integrated,
        };
        let indices = match args.refine_window {
            Some(window) => refine_peaks(&recording.samples, &track.indices, window),
            None => track.indices.clone(),
        };

        let written = write_peak_list(&args.output_dir, &recording.name, &args.channel, &indices);
        let (peak_file, error) = match written {
            Ok(path) => (Some(path), None),
            Err(e) => {
                error!("Failed to write peaks for {}: {:#}", recording.name, e);
                (None, Some(format!("{:#}", e)))
            }
        };

        summaries.push(RecordSummary {
            record: recording.name.clone(),
            channel: args.channel.clone(),
            fs: recording.fs,
            samples: recording.samples.len(),
            delay: Some(detection.delay),
            integrated_beats: detection.integrated.len(),
            band_limited_beats: detection.band_limited.len(),
            noise_peaks: detection.noise.len(),
            peak_file,
            error,
        });
    }

    let failed = summaries.iter().filter(|s| s.error.is_some()).count();
    info!(
        "Processed {} recordings, {} failed",
        summaries.len(),
        failed
    );

    if let Some(path) = &args.summary {
        write_summary_sorted(path, summaries)?;
    }

    Ok(())
}

fn failed_summary(args: &Args, record: String, samples: usize, error: String) -> RecordSummary {
    RecordSummary {
        record,
        channel: args.channel.clone(),
        fs: args.fs,
        samples,
        delay: None,
        integrated_beats: 0,
        band_limited_beats: 0,
        noise_peaks: 0,
        peak_file: None,
        error: Some(error),
    }
}

fn write_summary_sorted(path: &Path, mut summaries: Vec<RecordSummary>) -> Result<()> {
    summaries.sort_by(|a, b| a.record.cmp(&b.record));
    qrs_detect::output::write_summary(path, &summaries)
}

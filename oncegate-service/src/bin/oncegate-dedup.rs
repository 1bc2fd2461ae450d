//! Stream deduplicator.
//!
//! Reads newline-delimited tokens from stdin and writes each token to stdout
//! only the first time it is seen within the configured window. Lines are
//! compared as raw bytes and need not be UTF-8. Settings
//! come from the `ONCEGATE_*` environment variables; cache statistics are
//! printed to stderr as JSON on exit.
//!
//! ```text
//! $ ONCEGATE_DEFAULT_TTL_SECS=60 oncegate-dedup < events.log > unique.log
//! ```

use std::io::{self, BufRead, BufWriter, Write};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use oncegate_cache::{GuardError, Outcome, UniquenessCache};
use oncegate_service::{init_tracing, GuardSettings, ServiceResult, TelemetryConfig};

fn main() -> ExitCode {
    if let Err(e) = init_tracing(&TelemetryConfig::default()) {
        eprintln!("oncegate-dedup: {}", e);
        return ExitCode::from(2);
    }

    let settings = match GuardSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid settings");
            return ExitCode::from(2);
        }
    };

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Deduplication failed");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &GuardSettings) -> ServiceResult<()> {
    let cache: UniquenessCache<()> = UniquenessCache::new(settings.cache.clone())?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let skipped = dedup(
        &cache,
        settings.sweep_interval,
        stdin.lock(),
        BufWriter::new(stdout.lock()),
    )?;

    let stats = cache.stats();
    tracing::info!(
        accepted = stats.accepted,
        duplicates = stats.duplicates,
        skipped,
        "Input exhausted"
    );
    match serde_json::to_string(&stats) {
        Ok(json) => eprintln!("{}", json),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize statistics"),
    }
    Ok(())
}

/// Copy first occurrences of each newline-delimited token from `input` to
/// `output`. Tokens are raw bytes; a trailing `\r` is dropped. Returns the
/// number of lines skipped as invalid tokens (empty or too long).
fn dedup<R, W>(
    cache: &UniquenessCache<()>,
    sweep_interval: Duration,
    input: R,
    mut output: W,
) -> ServiceResult<u64>
where
    R: BufRead,
    W: Write,
{
    let mut last_sweep = Instant::now();
    let mut skipped = 0u64;

    for line in input.split(b'\n') {
        let line = line?;
        let token = line.strip_suffix(b"\r").unwrap_or(&line[..]);

        match cache.observe(token) {
            Ok(Outcome::Accepted) => {
                output.write_all(token)?;
                output.write_all(b"\n")?;
            }
            Ok(_) => {}
            Err(GuardError::InvalidToken(_)) => skipped += 1,
            Err(e) => return Err(e.into()),
        }

        if last_sweep.elapsed() >= sweep_interval {
            cache.sweep()?;
            last_sweep = Instant::now();
        }
    }
    output.flush()?;
    Ok(skipped)
}

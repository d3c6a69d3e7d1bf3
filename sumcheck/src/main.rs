mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use output::{DigestOutput, DigestedInput, LengthOutput, OutputWriter, VerifyOutput};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use sumcheck_core::{Algorithm, Digest, TarSum, TarSumInfo, Verifier, Verify};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CHUNK_SIZE: &str = "32768";

/// Sumcheck - streaming content verification
#[derive(Parser)]
#[command(name = "sumcheck")]
#[command(about = "Verify content against digests, tarsums and byte counts", long_about = None)]
#[command(version)]
struct Cli {
    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv); SUMCHECK_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Size of the writes used when streaming input into a verifier
    #[arg(
        long,
        global = true,
        env = "SUMCHECK_CHUNK_SIZE",
        default_value = DEFAULT_CHUNK_SIZE,
        value_parser = parse_chunk_size
    )]
    chunk_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the digest of each input
    Digest {
        /// Hash algorithm, or a tarsum tag such as tarsum.v1+sha256
        #[arg(long, default_value = "sha256")]
        algo: String,

        /// Inputs to digest ("-" reads stdin)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Verify an input against a digest
    Verify {
        /// Expected digest, e.g. sha256:<hex> or tarsum.v1+sha256:<hex>
        digest: String,

        /// Input to verify (defaults to stdin)
        path: Option<PathBuf>,
    },

    /// Verify that an input has exactly the expected length
    Length {
        /// Expected length in bytes
        expected: u64,

        /// Input to verify (defaults to stdin)
        path: Option<PathBuf>,
    },
}

/// Exit status of a successful run: 0 when verified, 1 when not.
fn status(verified: bool) -> u8 {
    if verified { 0 } else { 1 }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = OutputWriter::new(cli.json);
    let result = match cli.command {
        Commands::Digest { algo, paths } => cmd_digest(&output, &algo, &paths, cli.chunk_size),
        Commands::Verify { digest, path } => {
            cmd_verify(&output, &digest, path.as_deref(), cli.chunk_size)
        }
        Commands::Length { expected, path } => {
            cmd_length(&output, expected, path.as_deref(), cli.chunk_size)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            output.write_error(&err, 2);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env("SUMCHECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn parse_chunk_size(s: &str) -> std::result::Result<usize, String> {
    let size: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid byte count", s))?;
    if size == 0 {
        return Err("chunk size must be at least 1".to_string());
    }
    Ok(size)
}

fn display_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "-".to_string(), |p| p.display().to_string())
}

/// Open a file, or stdin for `-` and no path.
fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        None => Ok(Box::new(io::stdin().lock())),
        Some(p) if p == Path::new("-") => Ok(Box::new(io::stdin().lock())),
        Some(p) => {
            let file =
                File::open(p).with_context(|| format!("Failed to open {}", p.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Copy `reader` into `sink` in writes of at most `chunk_size` bytes.
fn copy_chunked<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    sink: &mut W,
    chunk_size: usize,
) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        sink.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Stream `reader` through `verifier` and close it.
///
/// The verifier is closed even when reading or writing failed.
fn stream_into(verifier: &mut Verifier, reader: &mut dyn Read, chunk_size: usize) -> Result<u64> {
    let copied = copy_chunked(reader, verifier, chunk_size);
    let closed = verifier.close();
    let bytes = copied.context("Failed to stream input into verifier")?;
    closed.context("Failed to finish verification")?;
    Ok(bytes)
}

/// Compute the digest named by `algo` over `reader`.
fn compute_digest(algo: &str, reader: &mut dyn Read, chunk_size: usize) -> Result<(Digest, u64)> {
    if algo.starts_with("tarsum") {
        let info = TarSumInfo::parse_algorithm(algo)
            .with_context(|| format!("Unsupported tarsum: {}", algo))?;
        let mut tarsum = TarSum::for_info(BufReader::with_capacity(chunk_size, reader), info);
        let bytes = tarsum.consume().context("Failed to read tar stream")?;
        Ok((tarsum.digest(), bytes))
    } else {
        let algorithm =
            Algorithm::parse(algo).with_context(|| format!("Unsupported algorithm: {}", algo))?;
        let mut hasher = algorithm.hasher();
        let bytes = copy_chunked(reader, &mut hasher, chunk_size)?;
        Ok((hasher.digest(), bytes))
    }
}

fn cmd_digest(
    output: &OutputWriter,
    algo: &str,
    paths: &[PathBuf],
    chunk_size: usize,
) -> Result<u8> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let mut reader = open_input(Some(path))?;
        let (digest, bytes) = compute_digest(algo, &mut reader, chunk_size)
            .with_context(|| format!("Failed to digest {}", path.display()))?;
        debug!(path = %path.display(), %digest, bytes, "digested input");
        inputs.push(DigestedInput {
            path: path.display().to_string(),
            digest,
            bytes,
        });
    }

    let data = DigestOutput {
        success: true,
        result_code: 0,
        inputs,
    };
    output.write(&data, || {
        data.inputs
            .iter()
            .map(|input| format!("{} {}\n", input.digest, input.path))
            .collect()
    })?;
    Ok(0)
}

fn cmd_verify(
    output: &OutputWriter,
    digest_str: &str,
    path: Option<&Path>,
    chunk_size: usize,
) -> Result<u8> {
    let expected =
        Digest::parse(digest_str).with_context(|| format!("Invalid digest: {}", digest_str))?;
    let mut reader = open_input(path)?;

    let mut verifier = Verifier::for_digest(&expected);
    info!(kind = %verifier.kind(), digest = %expected, "verifying input");
    let bytes = stream_into(&mut verifier, &mut reader, chunk_size)?;
    let verified = verifier.verified();
    let code = status(verified);

    let data = VerifyOutput {
        success: true,
        result_code: code,
        path: display_path(path),
        verified,
        expected,
        actual: verifier.actual(),
        bytes,
    };
    output.write(&data, || {
        if data.verified {
            format!("OK {}\n", data.path)
        } else {
            let actual = data
                .actual
                .as_ref()
                .map_or_else(|| "unknown".to_string(), Digest::to_string);
            format!(
                "FAILED {}\n  expected: {}\n  actual:   {}\n",
                data.path, data.expected, actual
            )
        }
    })?;
    Ok(code)
}

fn cmd_length(
    output: &OutputWriter,
    expected: u64,
    path: Option<&Path>,
    chunk_size: usize,
) -> Result<u8> {
    let mut reader = open_input(path)?;

    let mut verifier = Verifier::for_length(expected);
    let actual = stream_into(&mut verifier, &mut reader, chunk_size)?;
    let verified = verifier.verified();
    let code = status(verified);

    let data = LengthOutput {
        success: true,
        result_code: code,
        path: display_path(path),
        verified,
        expected,
        actual,
    };
    output.write(&data, || {
        if data.verified {
            format!("OK {} ({} bytes)\n", data.path, data.actual)
        } else {
            format!(
                "FAILED {}: expected {} bytes, got {}\n",
                data.path, data.expected, data.actual
            )
        }
    })?;
    Ok(code)
}

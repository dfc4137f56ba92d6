// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! range-download - standalone resumable HTTP downloader
//!
//! Fetches a file piece by piece with `Range` requests. Exit status is 0 on
//! success, 1 on a usage error and 2 when the download fails.

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser};
use otalink_download::{
    DownloadSession, EngineConfig, RangeDownloadEngine, ReqwestTransport, TerminalResult,
};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

const EXIT_OK: u8 = 0;
const EXIT_USAGE: u8 = 1;
const EXIT_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "range-download")]
#[command(about = "Download a file over HTTP in resumable, range-limited pieces", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Download URL
    #[arg(short = 'u', value_name = "URL")]
    url: String,

    /// Output file path, including the file name
    #[arg(short = 'p', value_name = "PATH")]
    path: PathBuf,

    /// Connection timeout in milliseconds
    #[arg(short = 't', value_name = "TIMEOUT_MS", default_value_t = 10_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Bytes requested per piece
    #[arg(short = 's', value_name = "BYTES", default_value_t = 1_048_576,
          value_parser = clap::value_parser!(u64).range(1..))]
    piece_size: u64,

    /// Continue after the bytes already present in the output file
    #[arg(short = 'r', long)]
    resume: bool,

    /// Retries for network failures before giving up
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Show this help
    #[arg(short = 'h', long = "help", short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() -> ExitCode {
    ExitCode::from(run(std::env::args_os()))
}

/// Parse the command line; `-help` is accepted alongside `-h` and `-?`.
fn parse_args<I>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = OsString>,
{
    Cli::try_parse_from(args.into_iter().map(|arg| {
        if arg == "-help" {
            OsString::from("--help")
        } else {
            arg
        }
    }))
}

/// Run the downloader and return the process exit status.
fn run<I>(args: I) -> u8
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match parse_args(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { EXIT_USAGE } else { EXIT_OK };
        }
    };

    // Already set when a previous run in this process installed it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,otalink_download=debug")),
        )
        .try_init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {e}");
            return EXIT_FAILED;
        }
    };

    match runtime.block_on(download(cli)) {
        Ok(bytes) => {
            info!("Download completed. Total size: {bytes} bytes");
            EXIT_OK
        }
        Err(e) => {
            error!("Download failed: {e:#}");
            EXIT_FAILED
        }
    }
}

async fn download(cli: Cli) -> anyhow::Result<u64> {
    let config = EngineConfig {
        connect_timeout: Duration::from_millis(cli.timeout_ms),
        ..EngineConfig::default()
    };

    let mut session = if cli.resume {
        DownloadSession::resume(&cli.url, &cli.path, cli.piece_size, cli.retries)
    } else {
        DownloadSession::new(&cli.url, &cli.path, cli.piece_size, cli.retries)
    }
    .context("Invalid download parameters")?;

    let engine = RangeDownloadEngine::new(config);
    let mut transport =
        ReqwestTransport::new(engine.config()).context("Failed to create HTTP transport")?;

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping download");
            cancel.cancel();
        }
    });

    match engine.run(&mut session, &mut transport).await {
        TerminalResult::Completed { bytes_written } => Ok(bytes_written),
        TerminalResult::Failed(reason) => Err(anyhow!(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("range-download")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_help_spellings() {
        for flag in ["-h", "--help", "-?", "-help"] {
            let err = parse_args(args(&[flag])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp, "{flag}");
            assert!(!err.use_stderr());
        }
        assert_eq!(run(args(&["-help"])), EXIT_OK);
    }

    #[test]
    fn test_defaults() {
        let cli = parse_args(args(&["-u", "http://h/f.bin", "-p", "/tmp/f.bin"])).unwrap();
        assert_eq!(cli.url, "http://h/f.bin");
        assert_eq!(cli.path, PathBuf::from("/tmp/f.bin"));
        assert_eq!(cli.timeout_ms, 10_000);
        assert_eq!(cli.piece_size, 1_048_576);
        assert_eq!(cli.retries, 3);
        assert!(!cli.resume);
    }

    #[test]
    fn test_all_flags() {
        let cli = parse_args(args(&[
            "-u", "http://h/f.bin", "-p", "f.bin", "-t", "500", "-s", "4096", "-r", "--retries",
            "7",
        ]))
        .unwrap();
        assert_eq!(cli.timeout_ms, 500);
        assert_eq!(cli.piece_size, 4096);
        assert_eq!(cli.retries, 7);
        assert!(cli.resume);
    }

    #[test]
    fn test_usage_errors_exit_1() {
        for list in [
            &["-p", "f.bin"][..],
            &["-u", "http://h/f.bin"],
            &["-u", "http://h/f.bin", "-p", "f.bin", "-s", "0"],
            &["-u", "http://h/f.bin", "-p", "f.bin", "-t", "0"],
            &["-u", "http://h/f.bin", "-p", "f.bin", "-s", "big"],
            &["-u", "http://h/f.bin", "-p", "f.bin", "--bogus"],
        ] {
            let err = parse_args(args(list)).unwrap_err();
            assert!(err.use_stderr(), "{list:?}");
            assert_eq!(run(args(list)), EXIT_USAGE, "{list:?}");
        }
    }

    #[test]
    fn test_download_completes_with_exit_0() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fw.bin");
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/fw.bin")
            .match_header("range", "bytes=0-15")
            .with_status(206)
            .with_header("content-range", "bytes 0-7/8")
            .with_body("firmware")
            .create();

        let url = format!("{}/fw.bin", server.url());
        let path_arg = path.to_string_lossy().into_owned();
        let code = run(args(&["-u", &url, "-p", &path_arg, "-s", "16"]));

        assert_eq!(code, EXIT_OK);
        assert_eq!(std::fs::read(&path).unwrap(), b"firmware");
    }

    #[test]
    fn test_unreachable_server_exits_2() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fw.bin");
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let url = format!("http://127.0.0.1:{port}/fw.bin");
        let path_arg = path.to_string_lossy().into_owned();
        let code = run(args(&["-u", &url, "-p", &path_arg, "--retries", "0"]));

        assert_eq!(code, EXIT_FAILED);
    }
}

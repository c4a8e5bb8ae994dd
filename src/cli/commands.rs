// ecert-cache — CLI Command Handlers
//
// Each function handles one CLI subcommand against a `StoreLifecycle` built
// from `--store-dir` / `ECERT_CACHE_DIR`. The `get` command stands in for
// the issuer round-trip with either a certificate file or an external
// fetch command.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::EcertError;
use crate::store::{fingerprint, CertificateStore, FetchError, StoreLifecycle, StorePaths};

use super::{Cli, Commands};

/// Where `get` obtains a certificate on a cache miss.
#[derive(Debug, Clone)]
enum Fetcher {
    File(PathBuf),
    /// Program and arguments, identity appended on each run.
    Command(Vec<String>),
}

impl Fetcher {
    fn fetch(&self, identity: &[u8]) -> Result<Vec<u8>, FetchError> {
        match self {
            Fetcher::File(path) => Ok(std::fs::read(path)?),
            Fetcher::Command(argv) => run_fetch_command(argv, identity),
        }
    }
}

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), EcertError> {
    let paths = match cli.store_dir {
        Some(dir) => StorePaths::new(dir),
        None => StorePaths::from_env(),
    };
    let lifecycle = StoreLifecycle::new(paths);

    match cli.command {
        Commands::Init => cmd_init(&lifecycle),
        Commands::Path => cmd_path(&lifecycle),
        Commands::Get {
            identity,
            base64,
            cert_file,
            fetch_cmd,
            out,
        } => {
            let fetcher = match (cert_file, fetch_cmd) {
                (Some(path), _) => Fetcher::File(path),
                (None, argv) if !argv.is_empty() => Fetcher::Command(argv),
                (None, _) => {
                    return Err(EcertError::Other(
                        "Either --cert-file or a fetch command after `--` is required".to_string(),
                    ))
                }
            };
            cmd_get(&lifecycle, &identity, base64, fetcher, out.as_deref()).await
        }
        Commands::Show { identity, base64 } => cmd_show(&lifecycle, &identity, base64),
        Commands::List { json } => cmd_list(&lifecycle, json),
        Commands::Purge => cmd_purge(&lifecycle),
    }
}

// ─── Init / Path ─────────────────────────────────────────────────────────────

fn cmd_init(lifecycle: &StoreLifecycle) -> Result<(), EcertError> {
    let store = lifecycle.initialize()?;

    println!("✓ Certificate store ready");
    println!("  Database: {}", store.path().display());
    println!("  Cached:   {}", store.count()?);

    Ok(())
}

fn cmd_path(lifecycle: &StoreLifecycle) -> Result<(), EcertError> {
    println!("{}", lifecycle.resolver().resolve_file_path().display());
    Ok(())
}

// ─── Get / Show ──────────────────────────────────────────────────────────────

async fn cmd_get(
    lifecycle: &StoreLifecycle,
    identity: &str,
    base64: bool,
    fetcher: Fetcher,
    out: Option<&Path>,
) -> Result<(), EcertError> {
    let identity = parse_identity(identity, base64)?;
    let store = lifecycle.initialize()?;
    let key = store.key_for(&identity);

    let cert = Arc::clone(&store)
        .get_async(identity, move |id| fetcher.fetch(id))
        .await?;

    println!("Certificate for {}:", key);
    println!("  Size:    {} bytes", cert.len());
    println!("  SHA-256: {}", fingerprint(&cert));

    if let Some(path) = out {
        std::fs::write(path, &cert)?;
        println!("  Written: {}", path.display());
    }

    Ok(())
}

fn cmd_show(lifecycle: &StoreLifecycle, identity: &str, base64: bool) -> Result<(), EcertError> {
    let identity = parse_identity(identity, base64)?;
    let store = open_existing(lifecycle)?;

    match store.peek(&identity)? {
        Some(record) => {
            println!("Cached certificate:\n");
            println!("  ID:      {}", record.id);
            println!("  Size:    {} bytes", record.cert.len());
            println!("  SHA-256: {}", record.fingerprint());
        }
        None => {
            println!("Not cached: {}", store.key_for(&identity));
        }
    }

    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

fn cmd_list(lifecycle: &StoreLifecycle, json: bool) -> Result<(), EcertError> {
    let store = open_existing(lifecycle)?;
    let summaries = store.list()?;

    if json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| EcertError::Other(format!("Failed to encode listing: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No certificates cached yet.");
        return Ok(());
    }

    println!("Cached certificates ({}):\n", summaries.len());
    for summary in &summaries {
        println!("  {}", summary);
    }

    Ok(())
}

// ─── Purge ───────────────────────────────────────────────────────────────────

fn cmd_purge(lifecycle: &StoreLifecycle) -> Result<(), EcertError> {
    let dir = lifecycle.resolver().resolve_directory();
    lifecycle.delete_store()?;
    println!("✓ Removed certificate store at {}", dir.display());
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the store without creating it.
fn open_existing(lifecycle: &StoreLifecycle) -> Result<Arc<CertificateStore>, EcertError> {
    let path = lifecycle.resolver().resolve_file_path();
    if !path.is_file() {
        return Err(EcertError::Other(format!(
            "Certificate store not found at {}. Run `ecert-cache init` first.",
            path.display()
        )));
    }
    Ok(lifecycle.open()?)
}

fn parse_identity(identity: &str, base64: bool) -> Result<Vec<u8>, EcertError> {
    if base64 {
        STANDARD
            .decode(identity)
            .map_err(|e| EcertError::Other(format!("Invalid base64 identity: {}", e)))
    } else {
        Ok(identity.as_bytes().to_vec())
    }
}

/// Run `argv` with the base64 identity as its last argument; stdout is
/// the certificate. Arguments are passed as given, without a shell.
fn run_fetch_command(argv: &[String], identity: &[u8]) -> Result<Vec<u8>, FetchError> {
    let (program, args) = argv.split_first().ok_or("Empty fetch command")?;

    let output = Command::new(program)
        .args(args)
        .arg(STANDARD.encode(identity))
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Fetch command exited with {}: {}", output.status, stderr.trim()).into());
    }

    tracing::debug!(program = %program, bytes = output.stdout.len(), "Fetch command succeeded");
    Ok(output.stdout)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_identity_text_and_base64() {
        assert_eq!(parse_identity("alice", false).unwrap(), b"alice");
        assert_eq!(parse_identity("AQI=", true).unwrap(), vec![0x01, 0x02]);
        assert!(parse_identity("not base64!", true).is_err());
    }

    #[test]
    fn test_get_requires_a_fetcher() {
        let parsed = Cli::try_parse_from(["ecert-cache", "get", "alice"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "ecert-cache", "get", "alice", "--cert-file", "a.der", "--", "x",
        ]);
        assert!(parsed.is_err(), "fetchers are mutually exclusive");
    }

    #[test]
    fn test_fetch_command_arguments_keep_embedded_spaces() {
        let cli = Cli::try_parse_from([
            "ecert-cache", "get", "alice", "--", "fetch-ecert", "--header", "X-Org: Org 1",
        ])
        .unwrap();

        match cli.command {
            Commands::Get { fetch_cmd, cert_file, .. } => {
                assert!(cert_file.is_none());
                assert_eq!(fetch_cmd, vec!["fetch-ecert", "--header", "X-Org: Org 1"]);
            }
            other => panic!("Expected get, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_passes_arguments_verbatim() {
        let argv = vec!["printf".to_string(), "%s|".to_string(), "a b".to_string()];
        let cert = Fetcher::Command(argv).fetch(&[0x01, 0x02]).unwrap();
        assert_eq!(cert, b"a b|AQI=|");
    }

    #[test]
    fn test_file_fetcher_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.der");
        std::fs::write(&path, [0x30, 0x82, 0x01]).unwrap();

        let cert = Fetcher::File(path).fetch(b"alice").unwrap();
        assert_eq!(cert, vec![0x30, 0x82, 0x01]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_passes_encoded_identity() {
        let cert = Fetcher::Command(vec!["echo".to_string(), "-n".to_string()])
            .fetch(&[0x01, 0x02]).unwrap();
        assert_eq!(cert, b"AQI=");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_failure_is_an_error() {
        let err = Fetcher::Command(vec!["false".to_string()]).fetch(b"alice").unwrap_err();
        assert!(err.to_string().contains("Fetch command exited"));
    }

    #[tokio::test]
    async fn test_init_get_and_list_against_temp_store() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("store");
        let cert_path = dir.path().join("cert.der");
        let out_path = dir.path().join("out.der");
        std::fs::write(&cert_path, b"enrollment-cert").unwrap();

        let dir_arg = store_dir.to_str().unwrap();
        let run = |args: &[&str]| {
            let mut argv = vec!["ecert-cache", "--store-dir", dir_arg];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap()
        };

        execute(run(&["init"])).await.unwrap();
        execute(run(&[
            "get",
            "alice",
            "--cert-file",
            cert_path.to_str().unwrap(),
            "--out",
            out_path.to_str().unwrap(),
        ]))
        .await
        .unwrap();
        assert_eq!(std::fs::read(&out_path).unwrap(), b"enrollment-cert");

        // The file fetcher is not consulted once cached.
        std::fs::remove_file(&cert_path).unwrap();
        execute(run(&["get", "alice", "--cert-file", cert_path.to_str().unwrap()]))
            .await
            .unwrap();

        execute(run(&["list", "--json"])).await.unwrap();
        execute(run(&["show", "alice"])).await.unwrap();

        execute(run(&["purge"])).await.unwrap();
        assert!(!store_dir.exists());
        assert!(execute(run(&["list"])).await.is_err());
    }
}

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::cache::{CacheEntry, is_nonempty_file};
use crate::error::AcquireError;
use crate::resolver::Platform;
use crate::steps::download_bar;

/// Runs an external tool and reports its exit status.
///
/// Extraction of zip archives shells out to `unzip`; hiding that behind this
/// trait lets tests substitute a fake instead of spawning real processes.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus>;
}

/// The real thing: spawn the tool and wait for it.
pub struct SystemTools;

impl ToolRunner for SystemTools {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus> {
        std::process::Command::new(program).args(args).status()
    }
}

/// Chunks queued toward the extractor before the downloader has to wait.
/// Keeps in-flight memory to a few network reads even when gunzip+untar is
/// the slower side.
const EXTRACT_QUEUE_CHUNKS: usize = 8;

/// Adapter feeding download chunks into the blocking gunzip+untar task.
struct ChannelReader {
    rx: mpsc::Receiver<Bytes>,
    current: Bytes,
}

impl std::io::Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.current.is_empty() {
            match self.rx.blocking_recv() {
                Some(chunk) => self.current = chunk,
                // Sender dropped: the download is finished (or failed, in
                // which case the unpack error is discarded upstream anyway).
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

fn join_io(err: tokio::task::JoinError) -> std::io::Error {
    std::io::Error::other(err)
}

fn unpack_tar_gz<R: std::io::Read>(reader: R, dest: &Path) -> std::io::Result<()> {
    let gz = GzDecoder::new(reader);
    let mut archive = tar::Archive::new(gz);
    archive.unpack(dest)
}

/// Download `url` into the cache archive file and extract it into `dest_dir`.
///
/// For tarballs the response stream is fanned out to two consumers, the cache
/// file write and the streaming gunzip+untar task. Both sinks are attached
/// before the first chunk is pulled, and both are awaited before success is
/// declared, so the bytes on disk and the bytes extracted are the same bytes.
///
/// For zip archives the stream is fully written to disk first (and the write
/// awaited), then the external `unzip` tool unpacks the file.
pub async fn download_and_extract(
    client: &reqwest::Client,
    url: &str,
    entry: &CacheEntry,
    dest_dir: &Path,
    platform: Platform,
    tools: &Arc<dyn ToolRunner>,
) -> Result<(), AcquireError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AcquireError::Download {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    tokio::fs::create_dir_all(dest_dir).await?;
    let bar = download_bar(response.content_length());
    let mut file = tokio::fs::File::create(&entry.archive_path).await?;

    let streaming_untar = platform.archive_ext() == "tar.gz";
    let (tx, extract_task) = if streaming_untar {
        let (tx, rx) = mpsc::channel::<Bytes>(EXTRACT_QUEUE_CHUNKS);
        let dest = dest_dir.to_path_buf();
        let task = tokio::task::spawn_blocking(move || {
            let reader = ChannelReader {
                rx,
                current: Bytes::new(),
            };
            unpack_tar_gz(reader, &dest)
        });
        (Some(tx), Some(task))
    } else {
        (None, None)
    };

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(tx) = &tx {
            // Awaits when the extractor falls behind, capping queued chunks.
            // A send failure means unpacking already failed and the join
            // below reports it.
            let _ = tx.send(chunk.clone()).await;
        }
        bar.inc(chunk.len() as u64);
        file.write_all(&chunk).await?;
    }
    drop(tx);
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    bar.finish_and_clear();

    if let Some(task) = extract_task {
        task.await.map_err(join_io)??;
    } else {
        unzip(tools, &entry.archive_path, dest_dir).await?;
    }
    Ok(())
}

/// Extract a trusted, already-cached archive into `dest_dir`.
pub async fn extract_cached_archive(
    entry: &CacheEntry,
    dest_dir: &Path,
    platform: Platform,
    tools: &Arc<dyn ToolRunner>,
) -> Result<(), AcquireError> {
    tokio::fs::create_dir_all(dest_dir).await?;
    if platform.archive_ext() == "zip" {
        unzip(tools, &entry.archive_path, dest_dir).await?;
    } else {
        let archive = entry.archive_path.clone();
        let dest = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&archive)?;
            unpack_tar_gz(file, &dest)
        })
        .await
        .map_err(join_io)??;
    }
    Ok(())
}

/// Extract a local `file://` tarball into `dest_dir`, bypassing download and
/// verification, and return the path of the runtime binary inside it.
///
/// The archive must produce exactly one new top-level directory.
pub async fn extract_local_archive(
    archive: &Path,
    dest_dir: &Path,
    platform: Platform,
) -> Result<PathBuf, AcquireError> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let before = top_level_dirs(dest_dir).await?;

    let archive = archive.to_path_buf();
    let dest = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive)?;
        unpack_tar_gz(file, &dest)
    })
    .await
    .map_err(join_io)??;

    let after = top_level_dirs(dest_dir).await?;
    let mut produced: Vec<&OsString> = after.difference(&before).collect();
    if produced.len() != 1 {
        return Err(AcquireError::ArchiveLayout(format!(
            "archive should contain exactly one top-level directory, found {}",
            produced.len()
        )));
    }
    let root = dest_dir.join(produced.remove(0));
    let binary = root.join(platform.exe_relpath());
    if !is_nonempty_file(&binary) {
        return Err(AcquireError::ArchiveLayout(format!(
            "extracted tree is missing {}",
            binary.display()
        )));
    }
    Ok(binary)
}

async fn top_level_dirs(dir: &Path) -> std::io::Result<HashSet<OsString>> {
    let mut names = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.insert(entry.file_name());
        }
    }
    Ok(names)
}

async fn unzip(
    tools: &Arc<dyn ToolRunner>,
    archive: &Path,
    dest_dir: &Path,
) -> Result<(), AcquireError> {
    let args = vec![
        "-q".to_string(),
        "-o".to_string(),
        archive.display().to_string(),
        "-d".to_string(),
        dest_dir.display().to_string(),
    ];
    let tools = Arc::clone(tools);
    let status = tokio::task::spawn_blocking(move || tools.run("unzip", &args))
        .await
        .map_err(join_io)??;
    if !status.success() {
        return Err(AcquireError::Tool {
            program: "unzip".to_string(),
            status,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    /// Build a gzipped tarball holding `bin/node`-style trees for each given
    /// top-level directory name.
    fn make_tarball(top_dirs: &[&str]) -> Vec<u8> {
        let gz = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(gz);
        for dir in top_dirs {
            let data = b"#!/bin/sh\necho node\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{dir}/bin/node"), &data[..])
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test]
    async fn test_extract_local_single_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("custom.tar.gz");
        std::fs::write(&archive, make_tarball(&["node-custom"])).unwrap();

        let dest = dir.path().join("out");
        let binary = extract_local_archive(&archive, &dest, Platform::Linux)
            .await
            .unwrap();
        assert_eq!(binary, dest.join("node-custom").join("bin").join("node"));
        assert!(binary.exists());
    }

    #[tokio::test]
    async fn test_extract_local_two_dirs_is_layout_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("custom.tar.gz");
        std::fs::write(&archive, make_tarball(&["one", "two"])).unwrap();

        let err = extract_local_archive(&archive, &dir.path().join("out"), Platform::Linux)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::ArchiveLayout(_)));
    }

    #[tokio::test]
    async fn test_extract_local_no_dir_is_layout_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("custom.tar.gz");
        // Only a bare top-level file, no directory at all.
        let gz = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(gz);
        let data = b"just a file\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "README", &data[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        std::fs::write(&archive, bytes).unwrap();

        let err = extract_local_archive(&archive, &dir.path().join("out"), Platform::Linux)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::ArchiveLayout(_)));
    }

    #[tokio::test]
    async fn test_extract_local_ignores_preexisting_dirs() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("custom.tar.gz");
        std::fs::write(&archive, make_tarball(&["node-custom"])).unwrap();

        let dest = dir.path().join("out");
        std::fs::create_dir_all(dest.join("node-v1.0.0-linux-x64")).unwrap();
        let binary = extract_local_archive(&archive, &dest, Platform::Linux)
            .await
            .unwrap();
        assert_eq!(binary, dest.join("node-custom").join("bin").join("node"));
    }

    struct FakeTools {
        calls: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ToolRunner for FakeTools {
        fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                Ok(ExitStatus::from_raw(0))
            }
            #[cfg(not(unix))]
            {
                std::process::Command::new("cmd").args(["/C", "exit 0"]).status()
            }
        }
    }

    #[tokio::test]
    async fn test_unzip_goes_through_tool_runner() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("node-v18.19.0-win-x64.zip");
        std::fs::write(&archive, b"zip bytes").unwrap();
        let fake = Arc::new(FakeTools {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let tools: Arc<dyn ToolRunner> = fake.clone();
        unzip(&tools, &archive, dir.path()).await.unwrap();
        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "unzip");
        assert!(calls[0].1.contains(&"-q".to_string()));
    }
}

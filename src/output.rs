//! Crash-safe zone file writing.
//!
//! Records are written to `<final>.temp` and renamed onto the final path
//! once complete, so a file at its final path is always whole.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

use crate::dns::resource::DNSResource;

pub const TEMP_SUFFIX: &str = ".temp";

/// Sibling temp path of a final output path
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp: OsString = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    PathBuf::from(temp)
}

/// File name for a zone or server: lower-cased, every byte outside
/// `[a-z0-9._-]` written as `%xx`, so distinct names never share a file
pub fn zone_file_name(name: &str) -> String {
    let name = name.trim_end_matches('.').to_lowercase();
    if name.is_empty() {
        // The root zone, spelled as its escaped dot
        return "%2e.txt".to_string();
    }

    let mut file_name = String::with_capacity(name.len() + 4);
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => file_name.push(byte as char),
            _ => file_name.push_str(&format!("%{:02x}", byte)),
        }
    }
    file_name.push_str(".txt");
    file_name
}

/// An output file that is still being written
pub struct PendingZoneFile {
    final_path: PathBuf,
    temp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: usize,
}

impl PendingZoneFile {
    pub async fn create(final_path: &Path) -> io::Result<Self> {
        let temp_path = temp_path_for(final_path);
        let file = File::create(&temp_path).await?;
        trace!("Opened {}", temp_path.display());
        Ok(Self {
            final_path: final_path.to_path_buf(),
            temp_path,
            writer: Some(BufWriter::new(file)),
            records: 0,
        })
    }

    pub async fn write_record(&mut self, record: &DNSResource) -> io::Result<()> {
        self.write_line(&record.to_record_line()).await
    }

    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        self.records += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flush, sync and rename onto the final path. On failure the temp
    /// file is removed.
    pub async fn commit(mut self) -> io::Result<PathBuf> {
        let writer = self.writer.take().ok_or_else(closed)?;
        match finish(writer, &self.temp_path, &self.final_path).await {
            Ok(()) => {
                debug!(
                    "Wrote {} records to {}",
                    self.records,
                    self.final_path.display()
                );
                Ok(self.final_path.clone())
            }
            Err(e) => {
                remove_temp(&self.temp_path).await;
                Err(e)
            }
        }
    }

    pub async fn discard(mut self) {
        // Close the handle before unlinking
        drop(self.writer.take());
        remove_temp(&self.temp_path).await;
    }
}

impl Drop for PendingZoneFile {
    fn drop(&mut self) {
        // Dropped mid-write, e.g. when a transfer deadline cancels the attempt
        if self.writer.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!("Failed to remove {}: {}", self.temp_path.display(), e);
                }
            }
        }
    }
}

async fn finish(mut writer: BufWriter<File>, temp_path: &Path, final_path: &Path) -> io::Result<()> {
    writer.flush().await?;
    let file = writer.into_inner();
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, final_path).await
}

async fn remove_temp(temp_path: &Path) {
    match fs::remove_file(temp_path).await {
        Ok(()) => trace!("Removed {}", temp_path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!("Failed to remove {}: {}", temp_path.display(), e),
    }
}

fn closed() -> io::Error {
    io::Error::other("zone file already closed")
}

/// Write `lines` to `path` atomically, one per line
pub async fn write_records<I, S>(path: &Path, lines: I) -> io::Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pending = PendingZoneFile::create(path).await?;
    for line in lines {
        if let Err(e) = pending.write_line(line.as_ref()).await {
            pending.discard().await;
            return Err(e);
        }
    }
    let count = pending.records_written();
    pending.commit().await?;
    Ok(count)
}

/// Atomically replace `path` with `contents`
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);
    let result = async {
        let mut file = File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;
    if result.is_err() {
        remove_temp(&temp_path).await;
    }
    result
}

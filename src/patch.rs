//! Patch executor: materializes the output file from seed copies and
//! network range fetches
//!
//! The temporary file is pre-sized to the target length and every byte of it
//! is written exactly once: in-place blocks and planned copies come from the
//! seed file, everything else arrives through range requests. The seed handle
//! is closed before the download stage begins.

use crate::control::Header;
use crate::error::{Error, Result};
use crate::plan::PatchPlan;
use crate::progress::{ProgressObserver, SyncState};
use crate::retry::{with_retry, RetryConfig};
use crate::transport::Transport;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use url::Url;

/// Executes a patch plan against a temporary output file
pub struct Patcher<'a> {
    header: &'a Header,
    seed_path: PathBuf,
    tmp_path: PathBuf,
    tmp: File,
}

impl<'a> Patcher<'a> {
    /// Create the temporary output file, pre-sized to the target length.
    /// Parent directories are created as needed.
    pub fn create(header: &'a Header, seed_path: &Path, tmp_path: &Path) -> Result<Self> {
        if let Some(parent) = tmp_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io("creating output directories", e))?;
        }

        let tmp = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp_path)
            .map_err(|e| Error::io("creating temporary output file", e))?;
        tmp.set_len(header.length)
            .map_err(|e| Error::io("sizing temporary output file", e))?;

        Ok(Self {
            header,
            seed_path: seed_path.to_path_buf(),
            tmp_path: tmp_path.to_path_buf(),
            tmp,
        })
    }

    /// Path of the temporary output file
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Run the copy and download stages. `in_place` lists the remote block
    /// indices already correct at the same index in the seed; they are copied
    /// unconditionally. Returns total bytes downloaded.
    pub async fn run<T: Transport>(
        mut self,
        in_place: &[u64],
        plan: &PatchPlan,
        file_url: &Url,
        transport: &T,
        retry: &RetryConfig,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<u64> {
        notify(observer, SyncState::CopyingBlocks);
        self.copy_stage(in_place, plan)?;

        notify(observer, SyncState::DownloadingPatch);
        let downloaded = self.download_stage(plan, file_url, transport, retry).await?;

        self.tmp
            .sync_all()
            .map_err(|e| Error::io("flushing temporary output file", e))?;
        self.tmp
            .set_modified(self.header.mtime.into())
            .map_err(|e| Error::io("setting output mtime", e))?;

        Ok(downloaded)
    }

    /// Copy in-place blocks and planned copy operations from the seed file,
    /// then release the seed handle
    fn copy_stage(&mut self, in_place: &[u64], plan: &PatchPlan) -> Result<()> {
        let mut seed =
            File::open(&self.seed_path).map_err(|e| Error::io("opening seed file", e))?;
        let mut buffer = vec![0u8; self.header.block_size];

        for &index in in_place {
            self.copy_block(&mut seed, &mut buffer, index, index)?;
        }
        for op in &plan.copy_ops {
            let local = op
                .local
                .as_ref()
                .ok_or_else(|| Error::config("copy operation without a local block"))?;
            self.copy_block(&mut seed, &mut buffer, op.remote.block_start, local.block_start)?;
        }

        Ok(())
    }

    /// Copy one block from the seed at `local_index` to the output position
    /// of `remote_index`, clipped at the target length
    fn copy_block(
        &mut self,
        seed: &mut File,
        buffer: &mut [u8],
        remote_index: u64,
        local_index: u64,
    ) -> Result<()> {
        let block_size = self.header.block_size as u64;
        let offset = remote_index * block_size;
        let len = std::cmp::min(block_size, self.header.length - offset) as usize;

        seed.seek(SeekFrom::Start(local_index * block_size))
            .map_err(|e| Error::io("seeking seed file", e))?;
        seed.read_exact(&mut buffer[..len])
            .map_err(|e| Error::io("reading seed block", e))?;

        self.tmp
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io("seeking output file", e))?;
        self.tmp
            .write_all(&buffer[..len])
            .map_err(|e| Error::io("writing copied block", e))?;

        Ok(())
    }

    /// Fetch every planned range and write the bytes at their target offsets
    async fn download_stage<T: Transport>(
        &mut self,
        plan: &PatchPlan,
        file_url: &Url,
        transport: &T,
        retry: &RetryConfig,
    ) -> Result<u64> {
        let block_size = self.header.block_size as u64;
        let mut total_downloaded = 0u64;

        for range in &plan.ranges {
            let offset = range.block_start * block_size;
            let len = std::cmp::min(range.size * block_size, self.header.length - offset);
            let end = offset + len - 1;

            tracing::info!(
                file = %self.header.filename,
                start = offset,
                end = end,
                "Downloading range"
            );

            let body =
                with_retry(retry, || transport.fetch_range(file_url, offset, end)).await?;
            if (body.len() as u64) < len {
                return Err(Error::network(format!(
                    "short range response: wanted {} bytes, got {}",
                    len,
                    body.len()
                )));
            }

            self.tmp
                .seek(SeekFrom::Start(offset))
                .map_err(|e| Error::io("seeking output file", e))?;
            self.tmp
                .write_all(&body[..len as usize])
                .map_err(|e| Error::io("writing downloaded range", e))?;

            total_downloaded += body.len() as u64;
        }

        Ok(total_downloaded)
    }
}

fn notify(observer: Option<&dyn ProgressObserver>, state: SyncState) {
    if let Some(obs) = observer {
        obs.state_changed(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::build_control_file_from_bytes;
    use crate::matcher::compare_tables;
    use crate::plan::plan_patch;
    use crate::scan::scan_bytes;
    use bytes::Bytes;
    use chrono::Utc;
    use futures::stream::{self, BoxStream, StreamExt};

    struct SliceTransport {
        data: Vec<u8>,
    }

    impl Transport for SliceTransport {
        async fn exists(&self, _url: &Url) -> Result<bool> {
            Ok(true)
        }

        async fn fetch(&self, _url: &Url) -> Result<Bytes> {
            Ok(Bytes::from(self.data.clone()))
        }

        async fn fetch_range(&self, _url: &Url, start: u64, end: u64) -> Result<Bytes> {
            let end = std::cmp::min(end as usize + 1, self.data.len());
            Ok(Bytes::from(self.data[start as usize..end].to_vec()))
        }

        async fn fetch_stream(&self, url: &Url) -> Result<BoxStream<'static, Result<Bytes>>> {
            let body = self.fetch(url).await?;
            Ok(stream::iter(vec![Ok(body)]).boxed())
        }
    }

    #[tokio::test]
    async fn test_patch_rebuilds_modified_file() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let seed_path = tmp_dir.path().join("file.bin");
        let out_path = tmp_dir.path().join("file.bin.part");

        let remote_data: Vec<u8> = (0..40u8).collect();
        let mut seed_data = remote_data.clone();
        seed_data[12] ^= 0xff; // corrupt block 1 of 4
        std::fs::write(&seed_path, &seed_data).unwrap();

        let cf = build_control_file_from_bytes(&remote_data, 10, "file.bin", None, Utc::now());
        let local = scan_bytes(&seed_data, &cf.header);
        let outcome = compare_tables(&cf.block_sums, &local);
        let plan = plan_patch(outcome.ops.clone(), 0);

        let transport = SliceTransport {
            data: remote_data.clone(),
        };
        let url = Url::parse("http://example.invalid/file.bin").unwrap();

        let patcher = Patcher::create(&cf.header, &seed_path, &out_path).unwrap();
        let downloaded = patcher
            .run(
                &outcome.in_place,
                &plan,
                &url,
                &transport,
                &RetryConfig::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(downloaded, 10); // exactly one block refetched
        assert_eq!(std::fs::read(&out_path).unwrap(), remote_data);
    }

    #[tokio::test]
    async fn test_clipped_last_block() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let seed_path = tmp_dir.path().join("f");
        let out_path = tmp_dir.path().join("f.part");

        // blockSize=4, length=10: blocks of 4, 4, 2
        let remote_data = b"aaaabbbbcc".to_vec();
        let mut seed_data = remote_data.clone();
        seed_data[5] = b'X'; // break block 1; blocks 0 and 2 still match
        std::fs::write(&seed_path, &seed_data).unwrap();

        let cf = build_control_file_from_bytes(&remote_data, 4, "f", None, Utc::now());
        let local = scan_bytes(&seed_data, &cf.header);
        let outcome = compare_tables(&cf.block_sums, &local);

        assert_eq!(outcome.ops.len(), 1);
        assert!(outcome.ops[0].local.is_none());
        assert_eq!(outcome.in_place, vec![0, 2]);

        let plan = plan_patch(outcome.ops.clone(), 0);
        let transport = SliceTransport {
            data: remote_data.clone(),
        };
        let url = Url::parse("http://example.invalid/f").unwrap();

        let patcher = Patcher::create(&cf.header, &seed_path, &out_path).unwrap();
        patcher
            .run(
                &outcome.in_place,
                &plan,
                &url,
                &transport,
                &RetryConfig::default(),
                None,
            )
            .await
            .unwrap();

        let rebuilt = std::fs::read(&out_path).unwrap();
        assert_eq!(rebuilt.len(), 10);
        assert_eq!(&rebuilt[8..], b"cc");
        assert_eq!(rebuilt, remote_data);
    }
}

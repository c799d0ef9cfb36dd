//! Sync orchestration: control file in, verified target file out
//!
//! A sync either fully replaces the target with a verified file or leaves it
//! exactly as it was. The return value is the total number of bytes fetched
//! over the network.

use crate::config::SyncOptions;
use crate::control::{read_control_file_from_bytes, ControlFile, Header};
use crate::error::{Error, Result};
use crate::install::verify_and_install;
use crate::matcher::compare_tables;
use crate::patch::Patcher;
use crate::plan::plan_patch;
use crate::progress::{ProgressObserver, SyncState};
use crate::retry::RetryConfig;
use crate::scan::scan_file;
use crate::transport::Transport;
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use url::Url;

/// Fetch a control file from `control_url`, then sync the file it describes
/// into `output_dir` under the header's filename.
pub async fn sync_from_url<T: Transport>(
    control_url: &Url,
    output_dir: &Path,
    transport: &T,
    options: &SyncOptions,
    observer: Option<&dyn ProgressObserver>,
) -> Result<u64> {
    let bytes = transport.fetch(control_url).await?;
    let cf = read_control_file_from_bytes(&bytes)?;
    let output = output_dir.join(cf.header.filename.trim_start());
    sync(&cf, Some(control_url), &output, transport, options, observer).await
}

/// Sync a single file described by a parsed control file.
///
/// With an existing seed at `output`, runs the scan/match/plan/patch
/// pipeline; without one, falls back to a streamed full download. Either way
/// the result is verified against the header's SHA-1 and installed
/// atomically.
pub async fn sync<T: Transport>(
    cf: &ControlFile,
    control_url: Option<&Url>,
    output: &Path,
    transport: &T,
    options: &SyncOptions,
    observer: Option<&dyn ProgressObserver>,
) -> Result<u64> {
    let file_url = resolve_file_url(&cf.header, control_url)?;

    if !transport.exists(&file_url).await? {
        return Err(Error::NotFound {
            url: file_url.to_string(),
        });
    }

    if output.exists() {
        patch_existing(cf, &file_url, output, transport, options, observer).await
    } else {
        tracing::debug!(output = %output.display(), "No seed file, performing full download");
        full_download(cf, &file_url, output, transport, options).await
    }
}

async fn patch_existing<T: Transport>(
    cf: &ControlFile,
    file_url: &Url,
    output: &Path,
    transport: &T,
    options: &SyncOptions,
    observer: Option<&dyn ProgressObserver>,
) -> Result<u64> {
    if let Some(obs) = observer {
        obs.state_changed(SyncState::ComputingDiff);
    }

    let local = scan_file(output, &cf.header)?;
    let outcome = compare_tables(&cf.block_sums, &local);

    tracing::info!(
        file = %cf.header.filename,
        changed_blocks = outcome.changed_blocks(),
        "Comparison complete"
    );

    let min_copy = options.min_copy_block_count(cf.header.block_size);
    let plan = plan_patch(outcome.ops.clone(), min_copy);

    let tmp_path = options.temp_path(output);
    let patcher = Patcher::create(&cf.header, output, &tmp_path)?;
    let retry = RetryConfig::from(options);

    let downloaded = patcher
        .run(
            &outcome.in_place,
            &plan,
            file_url,
            transport,
            &retry,
            observer,
        )
        .await?;

    verify_and_install(&tmp_path, output, &cf.header.sha1)?;

    tracing::info!(
        file = %cf.header.filename,
        bytes_downloaded = downloaded,
        "Sync complete"
    );

    Ok(downloaded)
}

/// Streamed full download into the temporary file, skipping the matching
/// pipeline entirely. Used when no seed file exists.
async fn full_download<T: Transport>(
    cf: &ControlFile,
    file_url: &Url,
    output: &Path,
    transport: &T,
    options: &SyncOptions,
) -> Result<u64> {
    let tmp_path = options.temp_path(output);

    if let Some(parent) = tmp_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io("creating output directories", e))?;
    }
    let mut tmp = std::fs::File::create(&tmp_path)
        .map_err(|e| Error::io("creating temporary output file", e))?;

    let mut stream = transport.fetch_stream(file_url).await?;
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        let data = chunk?;
        tmp.write_all(&data)
            .map_err(|e| Error::io("writing downloaded chunk", e))?;
        total += data.len() as u64;
    }

    tmp.sync_all()
        .map_err(|e| Error::io("flushing temporary output file", e))?;
    tmp.set_modified(cf.header.mtime.into())
        .map_err(|e| Error::io("setting output mtime", e))?;
    drop(tmp);

    verify_and_install(&tmp_path, output, &cf.header.sha1)?;

    tracing::info!(
        file = %cf.header.filename,
        bytes_downloaded = total,
        "Full download complete"
    );

    Ok(total)
}

/// Resolve the target file's URL: an absolute header URL wins, a relative
/// header URL is joined against the control file's URL, and failing both the
/// control URL with its `.zsync` suffix stripped is used.
fn resolve_file_url(header: &Header, control_url: Option<&Url>) -> Result<Url> {
    if let Some(raw) = &header.url {
        if let Ok(url) = Url::parse(raw) {
            return Ok(url);
        }
        if let Some(base) = control_url {
            return base.join(raw).map_err(Error::from);
        }
    }

    if let Some(control) = control_url {
        if let Some(stripped) = control.as_str().strip_suffix(".zsync") {
            return Url::parse(stripped).map_err(Error::from);
        }
    }

    Err(Error::config(
        "cannot determine file URL: no absolute URL in control file and no control URL given",
    ))
}

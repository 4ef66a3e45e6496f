use std::{
    fmt, fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

use crate::error::{Result, TaxiError};

const FONT_FILENAME: &str = "Arial.ttf";
const FONT_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0/Arial.ttf";

pub fn default_font_path() -> PathBuf {
    PathBuf::from("assets").join(FONT_FILENAME)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetDownloadEvent {
    AlreadyPresent,
    Started { total: Option<u64> },
    Progress { downloaded: u64, total: Option<u64> },
    Finished,
}

/// Make sure the overlay font exists at `font_path`, downloading it on first use.
pub fn ensure_font_ready<F>(font_path: &Path, mut on_event: F) -> Result<()>
where
    F: FnMut(AssetDownloadEvent),
{
    if font_path.is_file() {
        on_event(AssetDownloadEvent::AlreadyPresent);
        on_event(AssetDownloadEvent::Finished);
        return Ok(());
    }

    if let Some(parent) = font_path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            TaxiError::Asset(format!(
                "failed to create asset directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    let mut progress: Option<ProgressBar> = None;
    let result = download_to_path(FONT_URL, font_path, &mut |event| {
        match &event {
            AssetDownloadEvent::Started { total } => {
                progress = Some(create_progress_bar(*total));
            }
            AssetDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            AssetDownloadEvent::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message("overlay font ready");
                }
            }
            AssetDownloadEvent::AlreadyPresent => {}
        }
        on_event(event);
    });
    if let Some(pb) = progress.take() {
        pb.abandon_with_message("overlay font download failed");
    }
    result
}

fn asset_err(what: &str, err: &dyn fmt::Display) -> TaxiError {
    TaxiError::Asset(format!("{what}: {err}"))
}

fn download_to_path<F>(url: &str, dest: &Path, on_event: &mut F) -> Result<()>
where
    F: FnMut(AssetDownloadEvent),
{
    log::info!("downloading overlay font from {url} to {}", dest.display());
    let response = Client::new()
        .get(url)
        .send()
        .map_err(|err| asset_err("failed to start font download", &err))?
        .error_for_status()
        .map_err(|err| asset_err("font download returned error status", &err))?;

    let total = response.content_length();
    on_event(AssetDownloadEvent::Started { total });
    save_stream(response, total, dest, on_event)
}

/// Copy `reader` into `dest` through a sibling `.download` file. The partial
/// file is removed when the copy fails.
fn save_stream<R, F>(reader: R, total: Option<u64>, dest: &Path, on_event: &mut F) -> Result<()>
where
    R: Read,
    F: FnMut(AssetDownloadEvent),
{
    let tmp_path = dest.with_extension("download");
    let result = write_partial(reader, total, &tmp_path, on_event).and_then(|()| {
        fs::rename(&tmp_path, dest).map_err(|err| {
            let what = format!(
                "failed to move {} into place at {}",
                tmp_path.display(),
                dest.display()
            );
            asset_err(what.as_str(), &err)
        })
    });

    match result {
        Ok(()) => {
            on_event(AssetDownloadEvent::Finished);
            Ok(())
        }
        Err(err) => {
            if let Err(rm_err) = fs::remove_file(&tmp_path) {
                log::debug!("could not remove {}: {rm_err}", tmp_path.display());
            }
            Err(err)
        }
    }
}

fn write_partial<R, F>(
    mut reader: R,
    total: Option<u64>,
    tmp_path: &Path,
    on_event: &mut F,
) -> Result<()>
where
    R: Read,
    F: FnMut(AssetDownloadEvent),
{
    let mut file = fs::File::create(tmp_path).map_err(|err| {
        let what = format!("failed to create {}", tmp_path.display());
        asset_err(what.as_str(), &err)
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|err| asset_err("failed while reading font bytes", &err))?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .map_err(|err| asset_err("failed while writing font to disk", &err))?;
        downloaded += bytes_read as u64;
        on_event(AssetDownloadEvent::Progress { downloaded, total });
    }

    file.sync_all()
        .map_err(|err| asset_err("failed to flush font to disk", &err))
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    );
    match (total, bar_style) {
        (Some(total), Ok(style)) if total > 0 => {
            let pb = ProgressBar::new(total);
            pb.set_style(style.progress_chars("=>-"));
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading font") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}

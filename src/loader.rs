// loader.rs — decoding panoramas into `SourceImage`, inline or on a worker thread

use crate::buffer::SourceImage;
use crate::error::{Result, ViewerError};
use crate::i18n::tr_with;

use image::io::Reader as ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

/// Result of one background load, delivered exactly once.
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub result: Result<SourceImage>,
}

pub fn load_source_image(path: &Path) -> Result<SourceImage> {
    let load_err = |source: image::ImageError| ViewerError::ImageLoad {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| {
        log::error!("{}", tr_with("error.open_file", &[("err", e.to_string())]));
        load_err(image::ImageError::IoError(e))
    })?;

    // panoramas are routinely larger than the decoder's default limits
    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(|e| {
            log::error!("{}", tr_with("error.decode_image", &[("err", e.to_string())]));
            load_err(e)
        })?;

    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    log::info!(
        "{}",
        tr_with("log.image_loaded_size", &[("w", w.to_string()), ("h", h.to_string())])
    );
    if w != 2 * h {
        log::warn!("{w}x{h} is not 2:1, the panorama will look stretched");
    }
    SourceImage::from_image(rgba)
}

/// Decodes `path` off the event thread and sends the outcome to `tx`.
pub fn spawn_load(path: PathBuf, tx: Sender<LoadOutcome>) -> JoinHandle<()> {
    thread::spawn(move || {
        log::info!(
            "{}",
            tr_with("log.loading_image_bg", &[("path", path.display().to_string())])
        );
        let result = load_source_image(&path);
        if let Err(unsent) = tx.send(LoadOutcome { path, result }) {
            log::warn!(
                "viewer closed before {} finished loading",
                unsent.0.path.display()
            );
        }
    })
}

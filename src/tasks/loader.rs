use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{RgbaImage, imageops};
use tokio::select;
use tokio::sync::mpsc::{Sender, UnboundedReceiver};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::events::{LoadImage, LoadKey, LoaderEvent, PreparedImageCpu};

/// Decode `path` to RGBA8, honour its EXIF orientation and shrink it so the
/// longest edge fits `max_dimension`.
pub fn decode_for_texture(path: &Path, max_dimension: u32) -> Result<RgbaImage> {
    let decoded = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()
        .context("failed to sniff image format")?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgba8();

    let oriented = match read_orientation(path) {
        Some(orientation) => apply_orientation(decoded, orientation),
        None => decoded,
    };
    downscale_to_fit(oriented, max_dimension)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let exif = exif::Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!(orientation, path = %path.display(), "exif orientation");
    Some(orientation)
}

/// Map an EXIF orientation tag onto the pixel buffer; unknown tags pass through.
fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

/// Largest size with the same aspect ratio whose longest edge is `max_dimension`.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = f64::from(max_dimension) / f64::from(longest);
    let w = (f64::from(width) * scale).round().clamp(1.0, f64::from(max_dimension));
    let h = (f64::from(height) * scale).round().clamp(1.0, f64::from(max_dimension));
    (w as u32, h as u32)
}

fn downscale_to_fit(img: RgbaImage, max_dimension: u32) -> Result<RgbaImage> {
    let (width, height) = img.dimensions();
    let (target_w, target_h) = fit_within(width, height, max_dimension);
    if (target_w, target_h) == (width, height) {
        return Ok(img);
    }

    let src_view = fir::images::ImageRef::new(width, height, img.as_raw(), fir::PixelType::U8x4)
        .context("failed to create source view for texture resize")?;
    let mut dst = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    fir::Resizer::new()
        .resize(&src_view, &mut dst, Some(&options))
        .context("texture resize failed")?;
    debug!(width, height, target_w, target_h, "downscaled image for texture upload");
    RgbaImage::from_raw(target_w, target_h, dst.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}

enum Outcome {
    Loaded(LoadKey, PreparedImageCpu),
    Failed(LoadKey, PathBuf),
    Cancelled(LoadKey),
}

async fn load_one(request: LoadImage) -> Outcome {
    let LoadImage {
        key,
        path,
        max_dimension,
        cancel,
    } = request;

    let decode = tokio::task::spawn_blocking({
        let path = path.clone();
        move || decode_for_texture(&path, max_dimension)
    });

    select! {
        _ = cancel.cancelled() => Outcome::Cancelled(key),
        res = decode => match res {
            Ok(Ok(rgba)) => {
                let (width, height) = rgba.dimensions();
                Outcome::Loaded(key, PreparedImageCpu { path, width, height, pixels: rgba.into_raw() })
            }
            Ok(Err(err)) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "image load failed");
                Outcome::Failed(key, path)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "image decode task failed");
                Outcome::Failed(key, path)
            }
        },
    }
}

/// Decode requested images off the render thread.
///
/// At most `max_in_flight` decodes run at once. A request whose token is
/// cancelled before or during its decode produces no event.
#[instrument(skip(requests, to_viewer, cancel))]
pub async fn run(
    mut requests: UnboundedReceiver<LoadImage>,
    to_viewer: Sender<LoaderEvent>,
    cancel: CancellationToken,
    max_in_flight: usize,
) -> Result<()> {
    let mut tasks: JoinSet<Outcome> = JoinSet::new();
    let mut requests_open = true;

    loop {
        if !requests_open && tasks.is_empty() {
            debug!("request channel closed and no decodes in flight; stopping loader");
            break;
        }

        select! {
            _ = cancel.cancelled() => {
                debug!(in_flight = tasks.len(), "loader cancelled");
                break;
            }

            received = requests.recv(), if requests_open && tasks.len() < max_in_flight => {
                let Some(request) = received else {
                    requests_open = false;
                    continue;
                };
                if request.cancel.is_cancelled() {
                    debug!(key = ?request.key, "dropping request for superseded layout");
                    continue;
                }
                tasks.spawn(load_one(request));
            }

            Some(joined) = tasks.join_next() => {
                let event = match joined {
                    Ok(Outcome::Loaded(key, image)) => {
                        debug!(?key, path = %image.path.display(), "image decoded");
                        LoaderEvent::Ready { key, image }
                    }
                    Ok(Outcome::Failed(key, path)) => LoaderEvent::Failed { key, path },
                    Ok(Outcome::Cancelled(key)) => {
                        debug!(?key, "image load cancelled");
                        continue;
                    }
                    Err(err) => {
                        warn!(error = %err, "loader task panicked");
                        continue;
                    }
                };
                if to_viewer.send(event).await.is_err() {
                    debug!("viewer gone; stopping loader");
                    break;
                }
            }

            else => break,
        }
    }

    tasks.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn decoding_applies_exif_rotation() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let img = decode_for_texture(&path, 2048).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn fit_within_keeps_aspect() {
        assert_eq!(fit_within(4000, 2000, 2048), (2048, 1024));
        assert_eq!(fit_within(1000, 3000, 1500), (500, 1500));
        assert_eq!(fit_within(640, 480, 2048), (640, 480));
    }

    #[test]
    fn large_images_are_downscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(64, 16, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        let img = decode_for_texture(&path, 32).unwrap();
        assert_eq!(img.dimensions(), (32, 8));
    }

    #[test]
    fn orientation_three_rotates_half_turn() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        let rotated = apply_orientation(img, 3);
        assert_eq!(rotated.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }
}

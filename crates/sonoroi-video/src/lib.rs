//! Video sources that decode containers into grayscale frame sequences.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use dicom_pixeldata::PixelDecoder;
use image::{codecs::gif::GifDecoder, AnimationDecoder};
use sonoroi_types::{
    grid::{Frame, Video},
    Result, SonoError,
};
use tracing::{debug, info};

mod luminance;

pub use luminance::{frame_from_rgba, luminance};

#[async_trait]
pub trait VideoSource: Send + Sync {
    fn describe(&self) -> String;
    async fn load(&self) -> Result<Video>;
}

#[async_trait]
impl VideoSource for Box<dyn VideoSource> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn load(&self) -> Result<Video> {
        (**self).load().await
    }
}

/// Frames already decoded in memory.
pub struct InMemorySource {
    video: Video,
}

impl InMemorySource {
    pub fn new(video: Video) -> Self {
        Self { video }
    }
}

#[async_trait]
impl VideoSource for InMemorySource {
    fn describe(&self) -> String {
        format!("in-memory video ({} frames)", self.video.frame_count())
    }

    async fn load(&self) -> Result<Video> {
        Ok(self.video.clone())
    }
}

/// Directory of still PNG frames, ordered by file name.
pub struct FrameDirectorySource {
    dir: PathBuf,
}

impl FrameDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn frame_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|err| {
            video_error(format!("unable to read frame directory {:?}: {err}", self.dir))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| video_error(format!("directory entry error: {err}")))?
                .path();
            if path.is_file() && has_extension(&path, "png") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl VideoSource for FrameDirectorySource {
    fn describe(&self) -> String {
        format!("frame directory {:?}", self.dir)
    }

    async fn load(&self) -> Result<Video> {
        let paths = self.frame_paths()?;
        if paths.is_empty() {
            return Err(video_error(format!("no PNG frames in {:?}", self.dir)));
        }
        info!("Decoding {} frames from {:?}", paths.len(), self.dir);
        let frames = tokio::task::spawn_blocking(move || {
            paths
                .iter()
                .map(|path| decode_still(path))
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|err| video_error(format!("frame decoding task failed: {err}")))??;
        assemble(frames)
    }
}

/// Multi-frame GIF container.
pub struct AnimatedGifSource {
    path: PathBuf,
}

impl AnimatedGifSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl VideoSource for AnimatedGifSource {
    fn describe(&self) -> String {
        format!("animated GIF {:?}", self.path)
    }

    async fn load(&self) -> Result<Video> {
        let path = self.path.clone();
        let frames = tokio::task::spawn_blocking(move || decode_gif(&path))
            .await
            .map_err(|err| video_error(format!("GIF decoding task failed: {err}")))??;
        info!("Decoded {} frames from {:?}", frames.len(), self.path);
        assemble(frames)
    }
}

/// Multi-frame DICOM object. Every frame of the pixel data, RGB or
/// monochrome, becomes one video frame.
pub struct DicomSource {
    path: PathBuf,
}

impl DicomSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl VideoSource for DicomSource {
    fn describe(&self) -> String {
        format!("DICOM object {:?}", self.path)
    }

    async fn load(&self) -> Result<Video> {
        let path = self.path.clone();
        let frames = tokio::task::spawn_blocking(move || decode_dicom(&path))
            .await
            .map_err(|err| video_error(format!("DICOM decoding task failed: {err}")))??;
        info!("Decoded {} frames from {:?}", frames.len(), self.path);
        assemble(frames)
    }
}

/// Picks a source for `path`: directories hold PNG frames, `.gif` files are
/// animated containers and `.dcm`/`.dicom` files are DICOM objects.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn VideoSource>> {
    let path = path.as_ref();
    if path.is_dir() {
        Ok(Box::new(FrameDirectorySource::new(path)))
    } else if path.is_file() && has_extension(path, "gif") {
        Ok(Box::new(AnimatedGifSource::new(path)))
    } else if path.is_file() && (has_extension(path, "dcm") || has_extension(path, "dicom")) {
        Ok(Box::new(DicomSource::new(path)))
    } else {
        Err(video_error(format!(
            "unsupported input {:?}: expected a frame directory, .gif or .dcm file",
            path
        )))
    }
}

fn decode_still(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .map_err(|err| video_error(format!("failed to decode {:?}: {err}", path)))?;
    debug!("Decoded frame {:?}", path);
    Ok(frame_from_rgba(&img.to_rgba8()))
}

fn decode_gif(path: &Path) -> Result<Vec<Frame>> {
    let file = File::open(path)
        .map_err(|err| video_error(format!("unable to open {:?}: {err}", path)))?;
    let decoder = GifDecoder::new(BufReader::new(file))
        .map_err(|err| video_error(format!("invalid GIF {:?}: {err}", path)))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|err| video_error(format!("failed to decode GIF frames: {err}")))?;
    Ok(frames
        .iter()
        .map(|frame| frame_from_rgba(frame.buffer()))
        .collect())
}

fn decode_dicom(path: &Path) -> Result<Vec<Frame>> {
    let object = dicom_object::open_file(path)
        .map_err(|err| video_error(format!("unable to read DICOM {:?}: {err}", path)))?;
    let pixels = object
        .decode_pixel_data()
        .map_err(|err| video_error(format!("failed to decode DICOM pixel data: {err}")))?;
    debug!(
        "DICOM pixel data: {} frames of {}x{}, {} samples per pixel",
        pixels.number_of_frames(),
        pixels.rows(),
        pixels.columns(),
        pixels.samples_per_pixel()
    );
    (0..pixels.number_of_frames())
        .map(|index| {
            let image = pixels.to_dynamic_image(index).map_err(|err| {
                video_error(format!("failed to convert DICOM frame {index}: {err}"))
            })?;
            Ok(frame_from_rgba(&image.to_rgba8()))
        })
        .collect()
}

/// Builds a video whose shape is taken from the first frame.
fn assemble(frames: Vec<Frame>) -> Result<Video> {
    let shape = frames
        .first()
        .map(Frame::shape)
        .ok_or_else(|| video_error("video contains no frames"))?;
    Video::new(shape, frames)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

pub fn video_error(message: impl Into<String>) -> SonoError {
    SonoError::Video(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{codecs::gif::GifEncoder, Rgba, RgbaImage};
    use sonoroi_types::grid::GridShape;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sonoroi-video-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[tokio::test]
    async fn directory_frames_load_in_name_order() {
        let dir = scratch_dir("dir");
        for (name, level) in [("frame_002.png", 30u8), ("frame_000.png", 10), ("frame_001.png", 20)] {
            RgbaImage::from_pixel(4, 3, Rgba([level, level, level, 255]))
                .save(dir.join(name))
                .expect("write frame");
        }
        fs::write(dir.join("notes.txt"), "ignored").expect("write note");

        let video = FrameDirectorySource::new(&dir).load().await.expect("load video");
        assert_eq!(video.frame_count(), 3);
        assert_eq!(video.shape(), GridShape::new(3, 4));
        let firsts: Vec<f64> = video
            .frames()
            .iter()
            .map(|frame| *frame.get(0, 0).expect("cell"))
            .collect();
        assert_eq!(
            firsts,
            vec![luminance(10, 10, 10), luminance(20, 20, 20), luminance(30, 30, 30)]
        );
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn directory_with_mixed_sizes_is_shape_mismatch() {
        let dir = scratch_dir("mixed");
        RgbaImage::from_pixel(4, 3, Rgba([1, 1, 1, 255]))
            .save(dir.join("a.png"))
            .expect("write frame");
        RgbaImage::from_pixel(4, 4, Rgba([1, 1, 1, 255]))
            .save(dir.join("b.png"))
            .expect("write frame");
        let err = FrameDirectorySource::new(&dir).load().await.unwrap_err();
        assert!(matches!(err, SonoError::ShapeMismatch { .. }));
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn empty_directory_is_video_error() {
        let dir = scratch_dir("empty");
        let err = FrameDirectorySource::new(&dir).load().await.unwrap_err();
        assert!(matches!(err, SonoError::Video(_)));
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn gif_frames_keep_container_order() {
        let dir = scratch_dir("gif");
        let path = dir.join("clip.gif");
        {
            let file = File::create(&path).expect("create gif");
            let mut encoder = GifEncoder::new(file);
            let frames = [0u8, 255, 0].map(|level| {
                image::Frame::new(RgbaImage::from_pixel(5, 2, Rgba([level, level, level, 255])))
            });
            encoder.encode_frames(frames).expect("encode gif");
        }

        let source = open_source(&path).expect("gif source");
        let video = source.load().await.expect("load gif");
        assert_eq!(video.frame_count(), 3);
        assert_eq!(video.shape(), GridShape::new(2, 5));
        let dark = *video.frames()[0].get(0, 0).expect("cell");
        let bright = *video.frames()[1].get(0, 0).expect("cell");
        assert!(bright > dark);
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    fn write_rgb_dicom(path: &Path, rows: u16, cols: u16, frames: &[[u8; 3]]) {
        use dicom_core::{DataElement, PrimitiveValue, VR};
        use dicom_dictionary_std::tags;
        use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

        const SOP_CLASS: &str = "1.2.840.10008.5.1.4.1.1.3.1";
        let pixel_bytes: Vec<u8> = frames
            .iter()
            .flat_map(|rgb| {
                std::iter::repeat(rgb.iter().copied())
                    .take(rows as usize * cols as usize)
                    .flatten()
            })
            .collect();
        let object = InMemDicomObject::from_element_iter([
            DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(SOP_CLASS)),
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.1")),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(3_u16)),
            DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, PrimitiveValue::from("RGB ")),
            DataElement::new(
                tags::NUMBER_OF_FRAMES,
                VR::IS,
                PrimitiveValue::from(format!("{:<2}", frames.len())),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(cols)),
            DataElement::new(tags::PLANAR_CONFIGURATION, VR::US, PrimitiveValue::from(0_u16)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)),
            DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)),
            DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(7_u16)),
            DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)),
            DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(pixel_bytes)),
        ]);
        object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax("1.2.840.10008.1.2.1")
                    .media_storage_sop_class_uid(SOP_CLASS)
                    .media_storage_sop_instance_uid("2.25.1"),
            )
            .expect("file meta")
            .write_to_file(path)
            .expect("write dicom");
    }

    #[tokio::test]
    async fn dicom_frames_convert_to_luminance() {
        let dir = scratch_dir("dicom");
        let path = dir.join("clip.dcm");
        write_rgb_dicom(&path, 2, 4, &[[10, 20, 30], [200, 100, 50]]);

        let source = open_source(&path).expect("dicom source");
        assert!(source.describe().contains("DICOM"));
        let video = source.load().await.expect("load dicom");
        assert_eq!(video.frame_count(), 2);
        assert_eq!(video.shape(), GridShape::new(2, 4));
        let firsts: Vec<f64> = video
            .frames()
            .iter()
            .map(|frame| *frame.get(1, 3).expect("cell"))
            .collect();
        assert_eq!(firsts, vec![luminance(10, 20, 30), luminance(200, 100, 50)]);
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn unreadable_dicom_is_video_error() {
        let dir = scratch_dir("bad-dicom");
        let path = dir.join("broken.dcm");
        fs::write(&path, b"not a dicom file").expect("write file");
        let err = DicomSource::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SonoError::Video(_)));
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn unsupported_input_is_rejected() {
        assert!(open_source("/nonexistent/video.mp4").is_err());
    }

    #[tokio::test]
    async fn in_memory_source_returns_frames() {
        let shape = GridShape::new(1, 2);
        let video = Video::new(shape, vec![Frame::filled(shape, 1.0)]).expect("video");
        let source = InMemorySource::new(video.clone());
        assert_eq!(source.load().await.expect("load"), video);
    }
}

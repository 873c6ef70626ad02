//! MNIST IDX file parsing
//!
//! Images are scaled from `0..=255` into `[scale_min, scale_max]` and framed
//! by `padding` pixels filled with `scale_min`, so the 28×28 digits become
//! the 32×32 input LeNet expects.

use super::{Dataset, Sample};
use crate::{Error, Result};
use ndarray::Array1;
use std::path::Path;

const LABEL_MAGIC: u32 = 0x0000_0801;
const IMAGE_MAGIC: u32 = 0x0000_0803;
const NUM_CLASSES: usize = 10;

pub const TRAIN_IMAGES: &str = "train-images.idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels.idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images.idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels.idx1-ubyte";

/// Pixel scaling and framing applied while parsing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MnistOptions {
    pub scale_min: f32,
    pub scale_max: f32,
    /// Pixels added on every side
    pub padding: usize,
}

impl Default for MnistOptions {
    fn default() -> Self {
        Self {
            scale_min: -1.0,
            scale_max: 1.0,
            padding: 2,
        }
    }
}

/// Both MNIST corpora plus the padded image size
#[derive(Clone, Debug)]
pub struct MnistData {
    pub train: Dataset,
    pub test: Dataset,
    pub width: usize,
    pub height: usize,
}

/// Load the four standard MNIST files from `dir`
pub fn load_mnist(dir: impl AsRef<Path>, options: &MnistOptions) -> Result<MnistData> {
    let dir = dir.as_ref();
    let (train, width, height) = load_split(dir, TRAIN_IMAGES, TRAIN_LABELS, options)?;
    let (test, test_width, test_height) = load_split(dir, TEST_IMAGES, TEST_LABELS, options)?;

    if (width, height) != (test_width, test_height) {
        return Err(Error::DataLoad {
            path: dir.join(TEST_IMAGES),
            reason: format!(
                "test images are {test_width}x{test_height}, train images are {width}x{height}"
            ),
        });
    }

    Ok(MnistData {
        train,
        test,
        width,
        height,
    })
}

fn load_split(
    dir: &Path,
    images_file: &str,
    labels_file: &str,
    options: &MnistOptions,
) -> Result<(Dataset, usize, usize)> {
    let images_path = dir.join(images_file);
    let labels_path = dir.join(labels_file);

    let labels = parse_labels(&read_file(&labels_path)?).map_err(|reason| Error::DataLoad {
        path: labels_path.clone(),
        reason,
    })?;
    let images = parse_images(&read_file(&images_path)?, options).map_err(|reason| {
        Error::DataLoad {
            path: images_path.clone(),
            reason,
        }
    })?;

    if images.features.len() != labels.len() {
        return Err(Error::DataLoad {
            path: images_path,
            reason: format!(
                "{} images but {} labels in {}",
                images.features.len(),
                labels.len(),
                labels_path.display()
            ),
        });
    }

    let samples = images
        .features
        .into_iter()
        .zip(labels)
        .map(|(features, label)| Sample::new(features, label))
        .collect();
    let dataset = Dataset::new(samples, NUM_CLASSES)?;

    Ok((dataset, images.width, images.height))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::DataLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_u32(bytes: &[u8], at: usize) -> std::result::Result<u32, String> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| format!("header truncated at byte {at}"))
}

/// Parse an IDX1 label file
pub fn parse_labels(bytes: &[u8]) -> std::result::Result<Vec<usize>, String> {
    let magic = read_u32(bytes, 0)?;
    if magic != LABEL_MAGIC {
        return Err(format!("bad label magic number {magic:#010x}"));
    }
    let count = read_u32(bytes, 4)? as usize;

    let payload = &bytes[8..];
    if payload.len() < count {
        return Err(format!(
            "expected {count} labels, file holds {}",
            payload.len()
        ));
    }

    let labels: Vec<usize> = payload[..count].iter().map(|&l| l as usize).collect();
    if let Some(bad) = labels.iter().find(|&&l| l >= NUM_CLASSES) {
        return Err(format!("label {bad} is not a digit"));
    }
    Ok(labels)
}

/// Parsed and scaled image payload
#[derive(Debug)]
pub struct ParsedImages {
    pub features: Vec<Array1<f32>>,
    /// Width after padding
    pub width: usize,
    /// Height after padding
    pub height: usize,
}

/// Parse an IDX3 image file, scaling and padding every image
pub fn parse_images(bytes: &[u8], options: &MnistOptions) -> std::result::Result<ParsedImages, String> {
    let magic = read_u32(bytes, 0)?;
    if magic != IMAGE_MAGIC {
        return Err(format!("bad image magic number {magic:#010x}"));
    }
    let count = read_u32(bytes, 4)? as usize;
    let rows = read_u32(bytes, 8)? as usize;
    let cols = read_u32(bytes, 12)? as usize;

    let oversized = || format!("image header {count}x{rows}x{cols} is too large");
    let pixels = rows.checked_mul(cols).ok_or_else(oversized)?;
    let needed = count.checked_mul(pixels).ok_or_else(oversized)?;
    let payload = &bytes[16..];
    if payload.len() < needed {
        return Err(format!(
            "expected {count} images of {rows}x{cols}, payload is {} bytes",
            payload.len()
        ));
    }

    let pad = options.padding;
    let padded = |side: usize| pad.checked_mul(2).and_then(|p| side.checked_add(p));
    let width = padded(cols).ok_or_else(oversized)?;
    let height = padded(rows).ok_or_else(oversized)?;
    let frame = width.checked_mul(height).ok_or_else(oversized)?;
    let range = options.scale_max - options.scale_min;

    let features = payload
        .chunks_exact(pixels.max(1))
        .take(count)
        .map(|image| {
            let mut framed = vec![options.scale_min; frame];
            for y in 0..rows {
                for x in 0..cols {
                    let value = f32::from(image[y * cols + x]) / 255.0;
                    framed[(y + pad) * width + x + pad] = value * range + options.scale_min;
                }
            }
            Array1::from(framed)
        })
        .collect();

    Ok(ParsedImages {
        features,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn label_file(labels: &[u8]) -> Vec<u8> {
        let mut bytes = LABEL_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        bytes.extend_from_slice(labels);
        bytes
    }

    fn image_file(count: usize, rows: usize, cols: usize, fill: impl Fn(usize) -> u8) -> Vec<u8> {
        let mut bytes = IMAGE_MAGIC.to_be_bytes().to_vec();
        for dim in [count, rows, cols] {
            bytes.extend_from_slice(&(dim as u32).to_be_bytes());
        }
        bytes.extend((0..count * rows * cols).map(fill));
        bytes
    }

    fn write_corpus(dir: &Path, train: usize, test: usize) {
        let labels = |n: usize| (0..n).map(|i| (i % 10) as u8).collect::<Vec<_>>();
        std::fs::write(dir.join(TRAIN_LABELS), label_file(&labels(train))).unwrap();
        std::fs::write(dir.join(TEST_LABELS), label_file(&labels(test))).unwrap();
        std::fs::write(dir.join(TRAIN_IMAGES), image_file(train, 4, 4, |i| (i % 256) as u8)).unwrap();
        std::fs::write(dir.join(TEST_IMAGES), image_file(test, 4, 4, |_| 255)).unwrap();
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(parse_labels(&label_file(&[7, 2, 1])).unwrap(), vec![7, 2, 1]);
    }

    #[test]
    fn test_parse_labels_bad_magic() {
        let mut bytes = label_file(&[1]);
        bytes[3] = 0x03;
        assert!(parse_labels(&bytes).unwrap_err().contains("magic"));
    }

    #[test]
    fn test_parse_labels_truncated() {
        let mut bytes = label_file(&[1, 2, 3]);
        bytes.truncate(bytes.len() - 1);
        assert!(parse_labels(&bytes).is_err());
        assert!(parse_labels(&[0, 0]).is_err());
    }

    #[test]
    fn test_parse_labels_rejects_non_digit() {
        assert!(parse_labels(&label_file(&[3, 10])).is_err());
    }

    #[test]
    fn test_parse_images_scales_and_pads() {
        let bytes = image_file(1, 2, 2, |i| [0, 255, 51, 102][i]);
        let parsed = parse_images(&bytes, &MnistOptions::default()).unwrap();

        assert_eq!((parsed.width, parsed.height), (6, 6));
        let image = &parsed.features[0];
        assert_eq!(image.len(), 36);

        // Frame is filled with the minimum
        assert_relative_eq!(image[0], -1.0);
        assert_relative_eq!(image[35], -1.0);
        // Pixel (0, 0) lands at (2, 2)
        assert_relative_eq!(image[2 * 6 + 2], -1.0);
        assert_relative_eq!(image[2 * 6 + 3], 1.0);
        assert_relative_eq!(image[3 * 6 + 2], -0.6, epsilon = 1e-6);
        assert_relative_eq!(image[3 * 6 + 3], -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_images_custom_range_no_padding() {
        let options = MnistOptions {
            scale_min: 0.0,
            scale_max: 1.0,
            padding: 0,
        };
        let parsed = parse_images(&image_file(2, 1, 2, |_| 255), &options).unwrap();

        assert_eq!(parsed.features.len(), 2);
        assert_eq!(parsed.features[1].to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_parse_images_truncated_payload() {
        let mut bytes = image_file(2, 3, 3, |_| 0);
        bytes.truncate(bytes.len() - 5);
        assert!(parse_images(&bytes, &MnistOptions::default())
            .unwrap_err()
            .contains("payload"));
    }

    fn oversized_header(count: u32, rows: u32, cols: u32) -> Vec<u8> {
        let mut bytes = IMAGE_MAGIC.to_be_bytes().to_vec();
        for dim in [count, rows, cols] {
            bytes.extend_from_slice(&dim.to_be_bytes());
        }
        bytes.extend([0u8; 8]);
        bytes
    }

    #[test]
    fn test_parse_images_oversized_header() {
        let options = MnistOptions::default();
        let err = parse_images(&oversized_header(2, u32::MAX, u32::MAX), &options).unwrap_err();
        assert!(err.contains("too large"), "{err}");

        let wide = MnistOptions {
            padding: usize::MAX / 2,
            ..MnistOptions::default()
        };
        assert!(parse_images(&oversized_header(0, 4, 4), &wide).is_err());
    }

    #[test]
    fn test_load_mnist_oversized_header_is_data_load() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), 3, 3);
        std::fs::write(
            dir.path().join(TRAIN_IMAGES),
            oversized_header(2, u32::MAX, u32::MAX),
        )
        .unwrap();

        match load_mnist(dir.path(), &MnistOptions::default()) {
            Err(Error::DataLoad { path, .. }) => assert!(path.ends_with(TRAIN_IMAGES)),
            other => panic!("expected DataLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_load_mnist_directory() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), 12, 5);

        let data = load_mnist(dir.path(), &MnistOptions::default()).unwrap();

        assert_eq!(data.train.len(), 12);
        assert_eq!(data.test.len(), 5);
        assert_eq!((data.width, data.height), (8, 8));
        assert_eq!(data.train.feature_len(), Some(64));
        assert_eq!(data.train.samples()[11].label, 1);
        assert_eq!(data.train.num_classes(), 10);
    }

    #[test]
    fn test_load_mnist_missing_file() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), 3, 3);
        std::fs::remove_file(dir.path().join(TEST_LABELS)).unwrap();

        match load_mnist(dir.path(), &MnistOptions::default()) {
            Err(Error::DataLoad { path, .. }) => assert!(path.ends_with(TEST_LABELS)),
            other => panic!("expected DataLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_load_mnist_count_mismatch() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), 4, 4);
        std::fs::write(dir.path().join(TRAIN_LABELS), label_file(&[1, 2, 3])).unwrap();

        let err = load_mnist(dir.path(), &MnistOptions::default()).unwrap_err();
        assert!(err.to_string().contains("4 images but 3 labels"));
    }
}

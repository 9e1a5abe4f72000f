//! Single-band TIFF reading.
//!
//! Band files carry pixels only. Georeferencing comes from the scene
//! catalog, so the decoded dimensions are checked against the grid the
//! caller expects.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};

use crate::{GridSpec, Raster, RasterError};

/// Reads the first image of a TIFF file as `f32` samples on `grid`.
///
/// Integer samples are converted exactly (digital numbers), float samples
/// are passed through.
///
/// # Errors
///
/// * [`RasterError::Io`] if the file cannot be opened
/// * [`RasterError::Tiff`] if decoding fails
/// * [`RasterError::DimensionMismatch`] if the image size differs from `grid`
/// * [`RasterError::UnsupportedSampleFormat`] for signed 8-bit or 64-bit integer samples
#[allow(clippy::cast_precision_loss)]
pub fn read_band(path: &Path, grid: &GridSpec) -> Result<Raster<f32>, RasterError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    let (width, height) = decoder.dimensions()?;
    let (cols, rows) = (width as usize, height as usize);
    if (rows, cols) != (grid.rows, grid.cols) {
        return Err(RasterError::DimensionMismatch {
            expected_rows: grid.rows,
            expected_cols: grid.cols,
            rows,
            cols,
        });
    }

    let data: Vec<f32> = match decoder.read_image()? {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(RasterError::UnsupportedSampleFormat {
                path: path.display().to_string(),
            });
        }
    };

    log::debug!("Read {rows}x{cols} band from {}", path.display());
    Raster::from_vec(*grid, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Crs, GeoTransform};
    use tiff::encoder::{TiffEncoder, colortype};

    fn grid(rows: usize, cols: usize) -> GridSpec {
        GridSpec::new(
            Crs::from_epsg(32616),
            GeoTransform::new(0.0, 60.0, 30.0, -30.0).unwrap(),
            rows,
            cols,
        )
    }

    #[test]
    fn reads_float_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b4.tif");
        let pixels = [0.1_f32, 0.2, 0.3, 0.4, 0.5, 0.6];
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(3, 2, &pixels)
            .unwrap();

        let band = read_band(&path, &grid(2, 3)).unwrap();
        assert_eq!(band.data(), &pixels);
        assert_eq!(band.get(1, 0), Some(0.4));
    }

    #[test]
    fn reads_integer_band_as_digital_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b3.tif");
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray16>(2, 2, &[0_u16, 7000, 12000, 65535])
            .unwrap();

        let band = read_band(&path, &grid(2, 2)).unwrap();
        assert_eq!(band.data(), &[0.0, 7000.0, 12000.0, 65535.0]);
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b5.tif");
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(2, 2, &[0.0_f32; 4])
            .unwrap();

        assert!(matches!(
            read_band(&path, &grid(3, 2)),
            Err(RasterError::DimensionMismatch { rows: 2, cols: 2, .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            read_band(Path::new("/nonexistent/band.tif"), &grid(1, 1)),
            Err(RasterError::Io(_))
        ));
    }
}

//! Turning downloaded bytes into grids: gzip decompression and GRIB2 decoding.

use crate::snapshots::transport::partial_path;
use crate::types::grid::Grid;
use async_compression::tokio::bufread::GzipDecoder;
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// Reads a decompressed GRIB2 file into a point grid.
///
/// Decoding is CPU-bound; the artifact store calls it from a blocking task.
pub trait GridDecoder: Send + Sync + 'static {
    fn decode(&self, path: &Path) -> Result<Grid, DecodeError>;
}

/// [`GridDecoder`] backed by the `grib` crate. Decodes the first field of the file,
/// which for MRMS QPE files is the only one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grib2Decoder;

impl GridDecoder for Grib2Decoder {
    fn decode(&self, path: &Path) -> Result<Grid, DecodeError> {
        let file = File::open(path).map_err(|e| DecodeError(format!("cannot open file: {e}")))?;
        let grib2 = grib::from_reader(BufReader::new(file))
            .map_err(|e| DecodeError(format!("not a GRIB2 file: {e}")))?;

        let (_, submessage) = grib2
            .iter()
            .next()
            .ok_or_else(|| DecodeError("file contains no GRIB2 messages".to_string()))?;

        let latlons: Vec<(f32, f32)> = submessage
            .latlons()
            .map_err(|e| DecodeError(format!("cannot compute grid coordinates: {e}")))?
            .collect();
        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| DecodeError(format!("unsupported data representation: {e}")))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| DecodeError(format!("cannot unpack values: {e}")))?
            .collect();

        if latlons.len() != values.len() {
            return Err(DecodeError(format!(
                "grid has {} points but {} values",
                latlons.len(),
                values.len()
            )));
        }

        let mut grid = Grid {
            latitudes: Vec::with_capacity(values.len()),
            longitudes: Vec::with_capacity(values.len()),
            values: Vec::with_capacity(values.len()),
        };
        for ((lat, lon), value) in latlons.into_iter().zip(values) {
            grid.latitudes.push(f64::from(lat));
            grid.longitudes.push(f64::from(lon).rem_euclid(360.0));
            grid.values.push(value);
        }
        debug!("Decoded {} grid points from {:?}", grid.len(), path);
        Ok(grid)
    }
}

/// Gunzips `source` into `destination`, returning the decompressed size.
///
/// Like downloads, output goes to a `.part` sibling first and is renamed on success.
pub async fn decompress(source: &Path, destination: &Path) -> Result<u64, std::io::Error> {
    let partial = partial_path(destination);
    let result = async {
        let input = fs::File::open(source).await?;
        let mut decoder = GzipDecoder::new(tokio::io::BufReader::new(input));
        let mut output = fs::File::create(&partial).await?;
        let written = tokio::io::copy(&mut decoder, &mut output).await?;
        output.flush().await?;
        Ok::<u64, std::io::Error>(written)
    }
    .await;

    match result {
        Ok(written) => {
            fs::rename(&partial, destination).await?;
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::GzipEncoder;

    #[tokio::test]
    async fn test_decompress_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gz = dir.path().join("field.grib2.gz");
        let out = dir.path().join("field.grib2");
        let payload = b"GRIB fake payload 0123456789".repeat(50);

        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(&payload).await?;
        encoder.shutdown().await?;
        fs::write(&gz, encoder.into_inner()).await?;

        let written = decompress(&gz, &out).await?;
        assert_eq!(written, payload.len() as u64);
        assert_eq!(fs::read(&out).await?, payload);
        assert!(!partial_path(&out).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_decompress_rejects_garbage() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gz = dir.path().join("field.grib2.gz");
        let out = dir.path().join("field.grib2");
        fs::write(&gz, b"definitely not gzip").await?;

        assert!(decompress(&gz, &out).await.is_err());
        assert!(!out.exists());
        assert!(!partial_path(&out).exists());
        Ok(())
    }

    #[test]
    fn test_grib2_decoder_rejects_non_grib() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("field.grib2");
        std::fs::write(&path, b"plain text")?;
        assert!(Grib2Decoder.decode(&path).is_err());
        Ok(())
    }
}

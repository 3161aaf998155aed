//! Layer archive extraction.
//!
//! A layer blob is a tar archive, optionally gzip-compressed. Compression is
//! detected from the content, since staged blobs carry no extension.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{ImageError, ImageResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extracts the staged archive at `archive_path` on top of `target`.
///
/// Entries already present in `target` are overwritten, so a layer applied
/// later takes precedence. Returns the size of the archive in bytes.
///
/// # Errors
///
/// Returns [`ImageError::Extraction`] tagged with `index` if the archive
/// cannot be opened, is not a valid tar stream, or cannot be written out.
pub fn extract_layer(index: usize, archive_path: &Path, target: &Path) -> ImageResult<u64> {
    let extraction_error = |source| ImageError::Extraction {
        index,
        path: archive_path.to_path_buf(),
        source,
    };

    tracing::debug!(
        index,
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target).map_err(extraction_error)?;

    let file = File::open(archive_path).map_err(extraction_error)?;
    let size_bytes = file.metadata().map_err(extraction_error)?.len();

    let mut reader = BufReader::new(file);
    let compressed = is_gzip(&mut reader).map_err(extraction_error)?;

    let unpacked = if compressed {
        unpack(flate2::read::GzDecoder::new(reader), target)
    } else {
        unpack(reader, target)
    };
    unpacked.map_err(extraction_error)?;

    tracing::info!(index, size = size_bytes, compressed, "layer extracted");
    Ok(size_bytes)
}

fn unpack<R: Read>(reader: R, target: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.set_unpack_xattrs(false);
    archive.unpack(target)
}

/// Peeks at the buffered stream for the gzip magic bytes.
fn is_gzip<R: Read>(reader: &mut BufReader<R>) -> std::io::Result<bool> {
    let head = reader.fill_buf()?;
    Ok(head.starts_with(&GZIP_MAGIC))
}

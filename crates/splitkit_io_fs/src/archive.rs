//! Flat zip packaging of output files.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::report::ReportArchive;
use crate::spec::{EnumArchiveCompression, PackagingError, SpecArchiveOptions};
use crate::util::derive_parent_dir;

const N_SIZE_COPY_BUFFER: usize = 64 * 1024;

/// Bundle `paths_file_src` into one zip archive at `path_archive`.
///
/// Entries are flattened to their file names, in input order. The archive
/// is assembled in a temp file next to `path_archive` and renamed only after
/// every entry has been copied, so callers either get a complete archive or
/// a [`PackagingError`] with nothing left at `path_archive`.
pub fn create_zip_archive<P>(
    paths_file_src: &[P],
    path_archive: &Path,
    options: &SpecArchiveOptions,
) -> Result<ReportArchive, PackagingError>
where
    P: AsRef<Path>,
{
    if paths_file_src.is_empty() {
        return Err(PackagingError::NoInputs);
    }
    let l_entries = plan_entry_names(paths_file_src)?;

    let map_write_err = |message: String| PackagingError::WriteArchive {
        path: path_archive.to_path_buf(),
        message,
    };

    let file_tmp = NamedTempFile::new_in(derive_parent_dir(path_archive))
        .map_err(|e| map_write_err(e.to_string()))?;
    let mut zip_writer = ZipWriter::new(BufWriter::new(
        file_tmp.reopen().map_err(|e| map_write_err(e.to_string()))?,
    ));
    let method_compression = match options.rule_compression {
        EnumArchiveCompression::Stored => CompressionMethod::Stored,
        EnumArchiveCompression::Deflated => CompressionMethod::Deflated,
    };
    let zip_options = SimpleFileOptions::default().compression_method(method_compression);

    let mut cnt_bytes_source = 0u64;
    for (path_file_src, c_entry) in paths_file_src.iter().zip(&l_entries) {
        let path_file_src = path_file_src.as_ref();
        let mut file_src = File::open(path_file_src).map_err(|e| PackagingError::ReadInput {
            path: path_file_src.to_path_buf(),
            message: e.to_string(),
        })?;
        zip_writer
            .start_file(c_entry.as_str(), zip_options)
            .map_err(|e| map_write_err(e.to_string()))?;
        cnt_bytes_source +=
            copy_archive_entry(&mut file_src, &mut zip_writer, path_file_src, path_archive)?;
        debug!(entry = %c_entry, "added archive entry");
    }

    let buf_writer = zip_writer
        .finish()
        .map_err(|e| map_write_err(e.to_string()))?;
    let file_written = buf_writer
        .into_inner()
        .map_err(|e| map_write_err(e.error().to_string()))?;
    file_written
        .sync_all()
        .map_err(|e| map_write_err(e.to_string()))?;
    drop(file_written);

    file_tmp
        .persist(path_archive)
        .map_err(|e| map_write_err(e.error.to_string()))?;
    let cnt_bytes_archive = fs::metadata(path_archive)
        .map(|meta| meta.len())
        .map_err(|e| map_write_err(e.to_string()))?;

    let report = ReportArchive {
        path_archive: path_archive.to_path_buf(),
        entries: l_entries,
        cnt_bytes_source,
        cnt_bytes_archive,
    };
    info!("{report}");
    Ok(report)
}

/// Stream one input into the open archive entry.
///
/// Read failures blame the input file, write failures blame the archive.
fn copy_archive_entry<R, W>(
    reader: &mut R,
    writer: &mut W,
    path_file_src: &Path,
    path_archive: &Path,
) -> Result<u64, PackagingError>
where
    R: Read,
    W: Write,
{
    let mut v_buf = vec![0u8; N_SIZE_COPY_BUFFER];
    let mut cnt_bytes = 0u64;
    loop {
        let n_read = match reader.read(&mut v_buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(PackagingError::ReadInput {
                    path: path_file_src.to_path_buf(),
                    message: e.to_string(),
                });
            }
        };
        writer
            .write_all(&v_buf[..n_read])
            .map_err(|e| PackagingError::WriteArchive {
                path: path_archive.to_path_buf(),
                message: e.to_string(),
            })?;
        cnt_bytes += n_read as u64;
    }
    Ok(cnt_bytes)
}

fn plan_entry_names<P>(paths_file_src: &[P]) -> Result<Vec<String>, PackagingError>
where
    P: AsRef<Path>,
{
    let mut set_entries = BTreeSet::new();
    let mut l_entries = Vec::with_capacity(paths_file_src.len());
    for path_file_src in paths_file_src {
        let path_file_src: PathBuf = path_file_src.as_ref().to_path_buf();
        let Some(c_entry) = path_file_src
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
        else {
            return Err(PackagingError::InvalidInputName {
                path: path_file_src,
            });
        };
        if !set_entries.insert(c_entry.clone()) {
            return Err(PackagingError::DuplicateEntry(c_entry));
        }
        l_entries.push(c_entry);
    }
    Ok(l_entries)
}

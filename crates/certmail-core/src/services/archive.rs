//! ZIP export of rendered certificates

use super::compositor::Compositor;
use crate::error::Result;
use crate::types::Recipient;
use std::collections::HashSet;
use std::io::{Seek, Write};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What ended up in an archive
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entry names in the order they were written
    pub entries: Vec<String>,
    /// Rows whose certificate could not be rendered
    pub skipped: usize,
}

/// Render every row and write the PDFs into one ZIP archive.
///
/// Each entry is named `<Name_With_Underscores>_certificate.pdf`; repeated
/// names get a `_2`, `_3`, ... suffix. Rows that fail to render are logged
/// and left out.
pub fn write_archive<W: Write + Seek>(
    compositor: &Compositor,
    rows: &[(Recipient, Uuid)],
    writer: W,
) -> Result<ArchiveSummary> {
    let mut zip = ZipWriter::new(writer);
    let mut taken = HashSet::new();
    let mut summary = ArchiveSummary::default();

    for (recipient, certificate_id) in rows {
        let artifact = match compositor.render(recipient, *certificate_id) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::warn!("Skipped {} in archive: {}", recipient.name(), e);
                summary.skipped += 1;
                continue;
            }
        };

        let name = unique_entry_name(&mut taken, artifact.archive_entry_name());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&artifact.pdf)?;
        summary.entries.push(name);
    }

    zip.finish()?;
    log::info!(
        "Archive written: {} certificates ({} skipped)",
        summary.entries.len(),
        summary.skipped
    );
    Ok(summary)
}

fn unique_entry_name(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.clone()) {
        return name;
    }

    let stem = name.trim_end_matches(".pdf");
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}.pdf", stem, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_entry_name_suffixes_repeats() {
        let mut taken = HashSet::new();
        assert_eq!(unique_entry_name(&mut taken, "Ada_certificate.pdf".into()), "Ada_certificate.pdf");
        assert_eq!(unique_entry_name(&mut taken, "Ada_certificate.pdf".into()), "Ada_certificate_2.pdf");
        assert_eq!(unique_entry_name(&mut taken, "Ada_certificate.pdf".into()), "Ada_certificate_3.pdf");
        assert_eq!(unique_entry_name(&mut taken, "Alan_certificate.pdf".into()), "Alan_certificate.pdf");
    }
}

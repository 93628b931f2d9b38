//! SPDX document model, the short-form identifier searcher and the
//! tag-value writer.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

const LICENSE_TAG: &str = "SPDX-License-Identifier:";
const NOASSERTION: &str = "NOASSERTION";

/// Errors from building a document.
#[derive(Debug, Error)]
pub enum SpdxError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings for one document build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Prefix of the generated document namespace.
    pub namespace_prefix: String,

    /// Path fragments to skip. A fragment ending in `/` matches any
    /// directory with that name; otherwise it must equal the file's path
    /// relative to the root (with a leading `/`).
    pub ignored_paths: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            namespace_prefix: "https://peridot/primary/idsearcher".to_string(),
            ignored_paths: vec!["/.git/".to_string()],
        }
    }
}

impl SearchSettings {
    fn ignores_dir(&self, rel: &str) -> bool {
        let dir = format!("{}/", rel);
        self.ignored_paths
            .iter()
            .any(|p| p.ends_with('/') && dir.contains(p.as_str()))
    }

    fn ignores_file(&self, rel: &str) -> bool {
        self.ignored_paths.iter().any(|p| {
            if p.ends_with('/') {
                rel.contains(p.as_str())
            } else {
                rel == p
            }
        })
    }
}

/// One file in the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpdxFile {
    /// Path relative to the package root, as `./dir/name`.
    pub name: String,
    pub spdx_id: String,
    pub sha1: String,
    pub sha256: String,

    /// License expressions found in `SPDX-License-Identifier:` lines.
    pub license_expressions: Vec<String>,
}

impl SpdxFile {
    /// Distinct license identifiers referenced by this file's expressions.
    pub fn license_ids(&self) -> BTreeSet<String> {
        self.license_expressions
            .iter()
            .flat_map(|expr| license_ids(expr))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpdxPackage {
    pub name: String,
    pub spdx_id: String,
    pub verification_code: String,
    pub license_info_from_files: Vec<String>,
    pub files: Vec<SpdxFile>,
}

/// An SPDX 2.1 document describing a single package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpdxDocument {
    pub name: String,
    pub namespace: String,
    pub creator: String,
    pub created: DateTime<Utc>,
    pub package: SpdxPackage,
}

impl SpdxDocument {
    /// Write the document in SPDX 2.1 tag-value format.
    pub fn save_tag_value<W: Write>(&self, mut w: W) -> io::Result<()> {
        let pkg = &self.package;

        writeln!(w, "SPDXVersion: SPDX-2.1")?;
        writeln!(w, "DataLicense: CC0-1.0")?;
        writeln!(w, "SPDXID: SPDXRef-DOCUMENT")?;
        writeln!(w, "DocumentName: {}", self.name)?;
        writeln!(w, "DocumentNamespace: {}", self.namespace)?;
        writeln!(w, "Creator: {}", self.creator)?;
        writeln!(
            w,
            "Created: {}",
            self.created.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(w)?;

        writeln!(w, "##### Package: {}", pkg.name)?;
        writeln!(w)?;
        writeln!(w, "PackageName: {}", pkg.name)?;
        writeln!(w, "SPDXID: {}", pkg.spdx_id)?;
        writeln!(w, "PackageDownloadLocation: {}", NOASSERTION)?;
        writeln!(w, "FilesAnalyzed: true")?;
        writeln!(w, "PackageVerificationCode: {}", pkg.verification_code)?;
        writeln!(w, "PackageLicenseConcluded: {}", NOASSERTION)?;
        if pkg.license_info_from_files.is_empty() {
            writeln!(w, "PackageLicenseInfoFromFiles: {}", NOASSERTION)?;
        }
        for id in &pkg.license_info_from_files {
            writeln!(w, "PackageLicenseInfoFromFiles: {}", id)?;
        }
        writeln!(w, "PackageLicenseDeclared: {}", NOASSERTION)?;
        writeln!(w, "PackageCopyrightText: {}", NOASSERTION)?;
        writeln!(w)?;

        for file in &pkg.files {
            writeln!(w, "FileName: {}", file.name)?;
            writeln!(w, "SPDXID: {}", file.spdx_id)?;
            writeln!(w, "FileChecksum: SHA1: {}", file.sha1)?;
            writeln!(w, "FileChecksum: SHA256: {}", file.sha256)?;
            writeln!(w, "LicenseConcluded: {}", NOASSERTION)?;
            let ids = file.license_ids();
            if ids.is_empty() {
                writeln!(w, "LicenseInfoInFile: {}", NOASSERTION)?;
            }
            for id in ids {
                writeln!(w, "LicenseInfoInFile: {}", id)?;
            }
            writeln!(w, "FileCopyrightText: {}", NOASSERTION)?;
            writeln!(w)?;
        }

        writeln!(
            w,
            "Relationship: SPDXRef-DOCUMENT DESCRIBES {}",
            pkg.spdx_id
        )?;
        w.flush()
    }
}

/// Builds an SPDX document for a directory tree.
///
/// Implementations run on a blocking thread.
pub trait DocumentBuilder: Send + Sync + 'static {
    fn build(
        &self,
        package_name: &str,
        root: &Path,
        settings: &SearchSettings,
    ) -> Result<SpdxDocument, SpdxError>;
}

/// Document builder that hashes every file and collects short-form
/// license identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdSearcher;

impl DocumentBuilder for IdSearcher {
    fn build(
        &self,
        package_name: &str,
        root: &Path,
        settings: &SearchSettings,
    ) -> Result<SpdxDocument, SpdxError> {
        if !root.is_dir() {
            return Err(SpdxError::NotADirectory(root.to_path_buf()));
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !entry.file_type().is_dir() || !settings.ignores_dir(&relative(root, entry.path()))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative(root, entry.path());
            if settings.ignores_file(&rel) {
                debug!(path = %rel, "Skipping ignored file");
                continue;
            }

            let bytes = fs::read(entry.path()).map_err(|source| SpdxError::Read {
                path: entry.path().to_path_buf(),
                source,
            })?;
            files.push(SpdxFile {
                name: format!(".{}", rel),
                spdx_id: format!("SPDXRef-File{}", files.len()),
                sha1: hex::encode(Sha1::digest(&bytes)),
                sha256: hex::encode(Sha256::digest(&bytes)),
                license_expressions: find_license_expressions(&String::from_utf8_lossy(&bytes)),
            });
        }

        let verification_code = verification_code(&files);
        let license_info_from_files = files
            .iter()
            .flat_map(SpdxFile::license_ids)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(package = package_name, files = files.len(), "Built SPDX package");

        Ok(SpdxDocument {
            name: package_name.to_string(),
            namespace: format!("{}-{}", settings.namespace_prefix, verification_code),
            creator: format!("Tool: peridot-idsearcher-{}", env!("CARGO_PKG_VERSION")),
            created: Utc::now(),
            package: SpdxPackage {
                name: package_name.to_string(),
                spdx_id: format!("SPDXRef-Package-{}", package_name),
                verification_code,
                license_info_from_files,
                files,
            },
        })
    }
}

/// `/`-separated path of `path` below `root`, with a leading `/`.
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

/// SHA1 over the sorted, concatenated SHA1s of every file.
pub fn verification_code(files: &[SpdxFile]) -> String {
    let mut sums: Vec<&str> = files.iter().map(|f| f.sha1.as_str()).collect();
    sums.sort_unstable();
    hex::encode(Sha1::digest(sums.concat().as_bytes()))
}

/// License expressions from every `SPDX-License-Identifier:` line, in order
/// of first appearance.
pub fn find_license_expressions(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for line in text.lines() {
        let Some(idx) = line.find(LICENSE_TAG) else {
            continue;
        };
        let mut expr = line[idx + LICENSE_TAG.len()..].trim();
        for closer in ["*/", "-->", "#}", "%>"] {
            expr = expr.trim_end_matches(closer).trim_end();
        }
        if !expr.is_empty() && !found.iter().any(|f| f == expr) {
            found.push(expr.to_string());
        }
    }
    found
}

/// Split a license expression into its identifiers.
fn license_ids(expr: &str) -> Vec<String> {
    expr.replace(['(', ')'], " ")
        .split_whitespace()
        .filter(|tok| !matches!(tok.to_ascii_uppercase().as_str(), "AND" | "OR" | "WITH"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_find_license_expressions() {
        let text = "// SPDX-License-Identifier: MIT\n\
                    /* SPDX-License-Identifier: Apache-2.0 OR GPL-2.0-or-later */\n\
                    # SPDX-License-Identifier: MIT\n\
                    no tag here\n";
        assert_eq!(
            find_license_expressions(text),
            vec!["MIT".to_string(), "Apache-2.0 OR GPL-2.0-or-later".to_string()]
        );
    }

    #[test]
    fn test_license_ids_split_expression() {
        assert_eq!(
            license_ids("(MIT OR Apache-2.0) AND GPL-2.0-only WITH Classpath-exception-2.0"),
            vec!["MIT", "Apache-2.0", "GPL-2.0-only", "Classpath-exception-2.0"]
        );
    }

    #[test]
    fn test_build_skips_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.c", "// SPDX-License-Identifier: MIT\nint x;\n");
        write(dir.path(), "a.txt", "hello\n");
        write(dir.path(), "sub/.git/config", "ignored\n");
        write(dir.path(), ".git/HEAD", "ignored\n");
        write(dir.path(), "sub/d.py", "# SPDX-License-Identifier: BSD-3-Clause\n");

        let doc = IdSearcher
            .build("primary", dir.path(), &SearchSettings::default())
            .unwrap();

        let names: Vec<_> = doc.package.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["./a.txt", "./b.c", "./sub/d.py"]);
        assert_eq!(doc.package.files[2].spdx_id, "SPDXRef-File2");
        assert_eq!(
            doc.package.license_info_from_files,
            vec!["BSD-3-Clause".to_string(), "MIT".to_string()]
        );
        assert!(doc
            .namespace
            .starts_with("https://peridot/primary/idsearcher-"));
    }

    #[test]
    fn test_file_checksums_and_verification_code() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "abc");

        let doc = IdSearcher
            .build("primary", dir.path(), &SearchSettings::default())
            .unwrap();
        let file = &doc.package.files[0];
        assert_eq!(file.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            file.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            doc.package.verification_code,
            hex::encode(Sha1::digest(file.sha1.as_bytes()))
        );
    }

    #[test]
    fn test_build_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = IdSearcher
            .build("primary", &dir.path().join("nope"), &SearchSettings::default())
            .unwrap_err();
        assert!(matches!(err, SpdxError::NotADirectory(_)));
    }

    #[test]
    fn test_save_tag_value() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib.rs", "// SPDX-License-Identifier: Apache-2.0\n");
        write(dir.path(), "README", "plain\n");

        let doc = IdSearcher
            .build("primary", dir.path(), &SearchSettings::default())
            .unwrap();
        let mut out = Vec::new();
        doc.save_tag_value(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("SPDXVersion: SPDX-2.1\n"));
        assert!(text.contains("PackageName: primary\n"));
        assert!(text.contains(&format!(
            "PackageVerificationCode: {}\n",
            doc.package.verification_code
        )));
        assert!(text.contains("PackageLicenseInfoFromFiles: Apache-2.0\n"));
        assert!(text.contains("FileName: ./README\nSPDXID: SPDXRef-File0\n"));
        assert!(text.contains("LicenseInfoInFile: NOASSERTION\n"));
        assert!(text.contains("LicenseInfoInFile: Apache-2.0\n"));
        assert!(text.ends_with("Relationship: SPDXRef-DOCUMENT DESCRIBES SPDXRef-Package-primary\n"));
    }
}

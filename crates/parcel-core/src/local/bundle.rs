//! Bundle files: one reference's content in a zip archive.
//!
//! Layout:
//! - `bundle.toml`: `ref`, optional `origin` URL, optional `key-fingerprint`
//! - `keyring`: optional embedded keys, as armored `PARCEL KEY` blocks
//! - `files/`: the content tree

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reference::Reference;

pub const META_ENTRY: &str = "bundle.toml";
pub const KEYRING_ENTRY: &str = "keyring";
pub const FILES_PREFIX: &str = "files/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BundleMeta {
    #[serde(rename = "ref")]
    pub reference: Reference,

    /// Remote the bundle was produced from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Fingerprint of the key the content is signed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
}

#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    meta: BundleMeta,
    keyring: Option<Vec<u8>>,
    archive: zip::ZipArchive<File>,
}

impl Bundle {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(format!("Bundle not found: {}", path.display()))
            } else {
                Error::io(path, err)
            }
        })?;
        let what = format!("bundle {}", path.display());
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|err| Error::malformed(&what, err.to_string()))?;

        let meta_text = read_entry(&mut archive, META_ENTRY)
            .map_err(|err| Error::malformed(&what, format!("{err:#}")))?
            .ok_or_else(|| Error::malformed(&what, format!("missing {META_ENTRY}")))?;
        let meta_text = String::from_utf8(meta_text)
            .map_err(|err| Error::malformed(&what, err.to_string()))?;
        let meta: BundleMeta = toml::from_str(&meta_text)
            .map_err(|err| Error::malformed(&what, err.to_string()))?;

        let keyring = read_entry(&mut archive, KEYRING_ENTRY)
            .map_err(|err| Error::malformed(&what, format!("{err:#}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            meta,
            keyring,
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &BundleMeta {
        &self.meta
    }

    pub fn reference(&self) -> &Reference {
        &self.meta.reference
    }

    /// Check the bundle against `override_keys`, or its embedded keyring
    /// when no override is given. Unsigned bundles always pass.
    pub fn verify(&self, override_keys: Option<&[u8]>) -> anyhow::Result<()> {
        let Some(expected) = &self.meta.key_fingerprint else {
            return Ok(());
        };
        let keyring = override_keys
            .or(self.keyring.as_deref())
            .ok_or_else(|| anyhow::anyhow!("Bundle is signed but no keys are available"))?;
        if keyring_fingerprints(keyring).iter().any(|fp| fp == expected) {
            Ok(())
        } else {
            anyhow::bail!("No key matches bundle signature {expected}")
        }
    }

    /// Extract the `files/` tree into `dest`.
    pub fn extract_files(&mut self, dest: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

        for i in 0..self.archive.len() {
            let mut entry = self
                .archive
                .by_index(i)
                .with_context(|| format!("Failed to read bundle entry {}", i))?;

            // Entries with unsafe paths are skipped
            let Some(name) = entry.enclosed_name() else {
                continue;
            };
            let Ok(relative) = name.strip_prefix(FILES_PREFIX) else {
                continue;
            };
            if relative.as_os_str().is_empty() {
                continue;
            }
            let outpath = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath).with_context(|| {
                    format!("Failed to create directory: {}", outpath.display())
                })?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directory: {}", parent.display())
                })?;
            }
            let mut buffer = Vec::new();
            entry
                .read_to_end(&mut buffer)
                .with_context(|| format!("Failed to read bundle entry: {}", entry.name()))?;
            let mut outfile = File::create(&outpath)
                .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
            outfile
                .write_all(&buffer)
                .with_context(|| format!("Failed to write file: {}", outpath.display()))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
                }
            }
        }

        Ok(())
    }
}

fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("Failed to open {name}")),
    };
    let mut buffer = Vec::new();
    entry
        .read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read {name}"))?;
    Ok(Some(buffer))
}

pub const KEY_BEGIN: &str = "-----BEGIN PARCEL KEY-----";
pub const KEY_END: &str = "-----END PARCEL KEY-----";

/// Fingerprint of one key.
pub fn key_fingerprint(key: &[u8]) -> String {
    blake3::hash(key).to_hex().to_string()
}

/// Wrap `key` in an armored block, the unit a keyring is made of.
pub fn armor_key(key: &str) -> String {
    format!("{KEY_BEGIN}\n{key}\n{KEY_END}\n")
}

/// Keys of a keyring: the bodies of its armored blocks, with all whitespace
/// removed. Text outside blocks and unterminated blocks are ignored, so
/// keyrings concatenated byte for byte stay a valid keyring.
pub fn keyring_keys(keyring: &[u8]) -> Vec<Vec<u8>> {
    let text = String::from_utf8_lossy(keyring);
    let mut keys = Vec::new();
    let mut rest: &str = &text;

    while let Some(start) = rest.find(KEY_BEGIN) {
        let after = &rest[start + KEY_BEGIN.len()..];
        let Some(end) = after.find(KEY_END) else {
            break;
        };
        let mut body = &after[..end];
        // A block missing its END line is superseded by the next BEGIN
        if let Some(inner) = body.rfind(KEY_BEGIN) {
            body = &body[inner + KEY_BEGIN.len()..];
        }
        let key: Vec<u8> = body.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        if !key.is_empty() {
            keys.push(key);
        }
        rest = &after[end + KEY_END.len()..];
    }

    keys
}

/// Fingerprints of every key in a keyring.
pub fn keyring_fingerprints(keyring: &[u8]) -> Vec<String> {
    keyring_keys(keyring)
        .iter()
        .map(|key| key_fingerprint(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyring_keys_ignore_whitespace_and_stray_text() {
        let keyring = format!(
            "comment\n{KEY_BEGIN}\n  alp\r\nha \n{KEY_END}\n\n{}",
            armor_key("beta")
        );
        assert_eq!(
            keyring_fingerprints(keyring.as_bytes()),
            vec![key_fingerprint(b"alpha"), key_fingerprint(b"beta")]
        );
    }

    #[test]
    fn concatenation_without_trailing_newline_keeps_every_key() {
        let first = armor_key("alpha");
        let mut keyring = first.trim_end().as_bytes().to_vec();
        keyring.extend_from_slice(armor_key("beta").as_bytes());
        assert_eq!(
            keyring_fingerprints(&keyring),
            vec![key_fingerprint(b"alpha"), key_fingerprint(b"beta")]
        );
    }

    #[test]
    fn unterminated_block_is_dropped() {
        let keyring = format!("{KEY_BEGIN}\nbroken\n{}", armor_key("beta"));
        assert_eq!(
            keyring_fingerprints(keyring.as_bytes()),
            vec![key_fingerprint(b"beta")]
        );
    }

    #[test]
    fn bare_lines_are_not_keys() {
        assert!(keyring_fingerprints(b"alpha\nbeta\n").is_empty());
    }
}

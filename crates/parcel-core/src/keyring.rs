//! Chains key-material sources into one byte stream.
//!
//! `--gpg-file` may be repeated and may name standard input once. The
//! sources are concatenated in the order given.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Where one piece of key material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Stdin,
    File(PathBuf),
}

impl FromStr for KeySource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s == "-" {
            Self::Stdin
        } else {
            Self::File(PathBuf::from(s))
        })
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("standard input"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Open streams over every key source, owned until drained.
pub struct KeyChain<'a> {
    streams: Vec<(String, Box<dyn Read + 'a>)>,
}

impl fmt::Debug for KeyChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.streams.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("KeyChain").field("sources", &names).finish()
    }
}

impl<'a> KeyChain<'a> {
    /// Open every source before any byte is read.
    ///
    /// `stdin` is used for [`KeySource::Stdin`]; it is borrowed, never closed.
    /// Fails if the list is empty, names standard input twice, or a file
    /// can't be opened. In each case no data has been read.
    pub fn open(sources: &[KeySource], stdin: &'a mut dyn Read) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::usage("No key material sources given"));
        }
        if sources.iter().filter(|s| **s == KeySource::Stdin).count() > 1 {
            return Err(Error::usage(
                "Standard input can only be used once as key material",
            ));
        }

        let mut stdin = Some(stdin);
        let mut streams: Vec<(String, Box<dyn Read + 'a>)> = Vec::with_capacity(sources.len());
        for source in sources {
            let stream: Box<dyn Read + 'a> = match source {
                KeySource::Stdin => match stdin.take() {
                    Some(reader) => Box::new(reader),
                    None => {
                        return Err(Error::usage(
                            "Standard input can only be used once as key material",
                        ));
                    }
                },
                KeySource::File(path) => {
                    let file = File::open(path).map_err(|source| Error::KeyMaterial {
                        source_name: path.display().to_string(),
                        source,
                    })?;
                    Box::new(file)
                }
            };
            streams.push((source.to_string(), stream));
        }

        Ok(Self { streams })
    }

    /// Read every source to the end, in order, and release it.
    pub fn read_all(self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for (name, mut stream) in self.streams {
            stream
                .read_to_end(&mut data)
                .map_err(|source| Error::KeyMaterial {
                    source_name: name.clone(),
                    source,
                })?;
            tracing::debug!(source = %name, total = data.len(), "Read key material");
        }
        Ok(data)
    }
}

/// Read the concatenated key material of `sources`, or `None` when no
/// sources were given.
pub fn read_key_material(sources: &[KeySource], stdin: &mut dyn Read) -> Result<Option<Vec<u8>>> {
    if sources.is_empty() {
        return Ok(None);
    }
    KeyChain::open(sources, stdin)?.read_all().map(Some)
}

//! Shell completion for `install`.
//!
//! Completion only reads remote metadata; it never installs anything.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::directory::Directory;
use crate::error::Result;
use crate::reference::KindMask;

/// Flags accepted by `install`, in the form they are completed.
pub const INSTALL_FLAGS: &[&str] = &[
    "--arch=",
    "--no-pull",
    "--no-deploy",
    "--no-related",
    "--runtime",
    "--app",
    "--bundle",
    "--from",
    "--gpg-file=",
    "--subpath=",
];

/// Flags accepted by every subcommand.
pub const GLOBAL_FLAGS: &[&str] = &["--installation=", "--verbose"];

/// Flags that take a value, either as `--flag=VALUE` or as the next word.
const VALUE_FLAGS: &[&str] = &["--arch", "--gpg-file", "--subpath", "--installation"];

/// Complete the last word of an `install` command line.
///
/// `words` are the arguments after `install`; the last one is the word being
/// completed and may be empty. Flags among the earlier words narrow the
/// reference candidates (`--app`, `--runtime`, `--arch`). A word that is the
/// value of a preceding flag gets no candidates.
pub fn complete_install(
    dir: &dyn Directory,
    words: &[String],
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let (current, previous) = match words.split_last() {
        Some((current, previous)) => (current.as_str(), previous),
        None => ("", &[][..]),
    };

    let mut app = false;
    let mut runtime = false;
    let mut arch = None;
    let mut positionals = Vec::new();
    let mut words = previous.iter().map(String::as_str);
    while let Some(word) = words.next() {
        match word {
            "--app" => app = true,
            "--runtime" => runtime = true,
            flag if VALUE_FLAGS.contains(&flag) => {
                let Some(value) = words.next() else {
                    return Ok(Vec::new());
                };
                if flag == "--arch" {
                    arch = Some(value);
                }
            }
            flag if flag.starts_with("--arch=") => arch = Some(&flag["--arch=".len()..]),
            flag if flag.starts_with('-') => {}
            positional => positionals.push(positional),
        }
    }

    let Some(remote) = positionals.first() else {
        let mut candidates: Vec<String> = INSTALL_FLAGS
            .iter()
            .chain(GLOBAL_FLAGS)
            .filter(|flag| flag.starts_with(current))
            .map(|flag| flag.to_string())
            .collect();
        candidates.extend(
            dir.list_remotes()?
                .into_iter()
                .filter(|remote| remote.starts_with(current)),
        );
        return Ok(candidates);
    };

    complete_partial_ref(
        dir,
        remote,
        current,
        KindMask::from_flags(app, runtime),
        arch,
        cancel,
    )
}

/// Candidates for a partial `id[/arch[/branch]]` word. Completes one level
/// past the number of slashes already typed.
pub fn complete_partial_ref(
    dir: &dyn Directory,
    remote: &str,
    current: &str,
    kinds: KindMask,
    arch: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let depth = current.matches('/').count().min(2);
    let refs = dir.list_remote_refs(remote, cancel)?;

    let candidates: BTreeSet<String> = refs
        .iter()
        .filter(|r| kinds.contains(r.kind()))
        .filter(|r| arch.is_none_or(|a| a == r.arch()))
        .map(|r| [r.id(), r.arch(), r.branch()][..=depth].join("/"))
        .filter(|candidate| candidate.starts_with(current))
        .collect();

    Ok(candidates.into_iter().collect())
}

//! Reference types: fully qualified references, kind masks and partial refs.
//!
//! A [`Reference`] is the canonical `kind/id/arch/branch` name of one
//! installable unit. Users usually type less than that; [`PartialRef`] holds
//! whatever they supplied until the resolver fills in the rest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

const MAX_ID_LEN: usize = 255;

/// Kind of installable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefKind {
    App,
    Runtime,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Runtime => "runtime",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app" => Ok(Self::App),
            "runtime" => Ok(Self::Runtime),
            other => Err(Error::invalid_ref(other, "kind must be 'app' or 'runtime'")),
        }
    }
}

/// Set of kinds a lookup is allowed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindMask {
    app: bool,
    runtime: bool,
}

impl KindMask {
    pub const ALL: Self = Self {
        app: true,
        runtime: true,
    };
    pub const APP: Self = Self {
        app: true,
        runtime: false,
    };
    pub const RUNTIME: Self = Self {
        app: false,
        runtime: true,
    };
    pub const NONE: Self = Self {
        app: false,
        runtime: false,
    };

    /// Build a mask from `--app`/`--runtime` style flags. Neither flag means
    /// both kinds are allowed.
    pub fn from_flags(app: bool, runtime: bool) -> Self {
        if !app && !runtime {
            Self::ALL
        } else {
            Self { app, runtime }
        }
    }

    pub fn only(kind: RefKind) -> Self {
        match kind {
            RefKind::App => Self::APP,
            RefKind::Runtime => Self::RUNTIME,
        }
    }

    pub fn contains(self, kind: RefKind) -> bool {
        match kind {
            RefKind::App => self.app,
            RefKind::Runtime => self.runtime,
        }
    }

    pub fn intersect(self, other: Self) -> Self {
        Self {
            app: self.app && other.app,
            runtime: self.runtime && other.runtime,
        }
    }

    pub fn is_empty(self) -> bool {
        !self.app && !self.runtime
    }

    /// Kinds in the mask, apps first.
    pub fn kinds(self) -> impl Iterator<Item = RefKind> {
        [RefKind::App, RefKind::Runtime]
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl Default for KindMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Fully qualified reference. Every part is concrete and validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    kind: RefKind,
    id: String,
    arch: String,
    branch: String,
}

impl Reference {
    pub fn new(
        kind: RefKind,
        id: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let arch = arch.into();
        let branch = branch.into();
        validate_id(&id)?;
        validate_arch(&arch)?;
        validate_branch(&branch)?;
        Ok(Self {
            kind,
            id,
            arch,
            branch,
        })
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// The reference without its kind prefix, as shown in progress output.
    pub fn short_name(&self) -> String {
        format!("{}/{}/{}", self.id, self.arch, self.branch)
    }

    /// Path components under which this reference is stored on disk.
    pub fn path_components(&self) -> [&str; 4] {
        [self.kind.as_str(), &self.id, &self.arch, &self.branch]
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.kind, self.id, self.arch, self.branch)
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 4 {
            return Err(Error::invalid_ref(
                s,
                "expected four components (kind/id/arch/branch)",
            ));
        }
        let kind = parts[0]
            .parse::<RefKind>()
            .map_err(|_| Error::invalid_ref(s, "kind must be 'app' or 'runtime'"))?;
        Self::new(kind, parts[1], parts[2], parts[3])
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// User input split into its parts, not yet checked against any remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRef {
    pub kinds: KindMask,
    pub id: String,
    pub arch: Option<String>,
    pub branch: Option<String>,
}

impl PartialRef {
    /// Split `[kind/]id[/arch[/branch]]`.
    ///
    /// Parts embedded in `input` take precedence over `default_arch` and
    /// `default_branch`. An empty embedded part (`id//branch`) counts as
    /// absent. A `app/` or `runtime/` prefix narrows `mask`.
    pub fn parse(
        input: &str,
        mask: KindMask,
        default_arch: Option<&str>,
        default_branch: Option<&str>,
    ) -> Result<Self> {
        let mut parts: Vec<&str> = input.split('/').collect();
        if parts.len() > 4 {
            return Err(Error::invalid_ref(input, "too many components"));
        }

        let mut kinds = mask;
        if let Ok(kind) = parts[0].parse::<RefKind>() {
            kinds = mask.intersect(KindMask::only(kind));
            if kinds.is_empty() {
                return Err(Error::invalid_ref(
                    input,
                    format!("'{kind}' is excluded by the requested kind"),
                ));
            }
            parts.remove(0);
        }

        if parts.is_empty() || parts.len() > 3 {
            return Err(Error::invalid_ref(input, "expected id[/arch[/branch]]"));
        }

        let id = parts[0].to_string();
        validate_id(&id).map_err(|err| Error::invalid_ref(input, reason_of(err)))?;

        let arch = non_empty(parts.get(1).copied())
            .or(default_arch)
            .map(str::to_string);
        if let Some(arch) = &arch {
            validate_arch(arch).map_err(|err| Error::invalid_ref(input, reason_of(err)))?;
        }

        let branch = non_empty(parts.get(2).copied())
            .or(default_branch)
            .map(str::to_string);
        if let Some(branch) = &branch {
            validate_branch(branch).map_err(|err| Error::invalid_ref(input, reason_of(err)))?;
        }

        Ok(Self {
            kinds,
            id,
            arch,
            branch,
        })
    }

    pub fn matches(&self, reference: &Reference) -> bool {
        self.kinds.contains(reference.kind())
            && reference.id() == self.id
            && self.arch.as_deref().is_none_or(|a| a == reference.arch())
            && self
                .branch
                .as_deref()
                .is_none_or(|b| b == reference.branch())
    }
}

impl fmt::Display for PartialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.id,
            self.arch.as_deref().unwrap_or(""),
            self.branch.as_deref().unwrap_or("")
        )
    }
}

fn non_empty(part: Option<&str>) -> Option<&str> {
    part.filter(|p| !p.is_empty())
}

fn reason_of(err: Error) -> String {
    match err {
        Error::InvalidRef { reason, .. } => reason,
        other => other.to_string(),
    }
}

/// Validate an application or runtime id such as `org.example.App`.
///
/// Ids have at least three dot-separated elements. Each element starts with
/// a letter or `_` and continues with letters, digits, `_` or `-`.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid_ref(id, "id can't be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(Error::invalid_ref(id, "id is longer than 255 characters"));
    }
    let elements: Vec<&str> = id.split('.').collect();
    if elements.len() < 3 {
        return Err(Error::invalid_ref(id, "id must contain at least 2 periods"));
    }
    for element in elements {
        let mut chars = element.chars();
        match chars.next() {
            None => return Err(Error::invalid_ref(id, "id can't contain empty elements")),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(c) => {
                return Err(Error::invalid_ref(
                    id,
                    format!("element can't start with '{c}'"),
                ));
            }
        }
        if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
            return Err(Error::invalid_ref(id, format!("'{c}' not allowed in id")));
        }
    }
    Ok(())
}

/// Validate a branch name: `[A-Za-z0-9_][A-Za-z0-9_.-]*`.
pub fn validate_branch(branch: &str) -> Result<()> {
    let mut chars = branch.chars();
    match chars.next() {
        None => return Err(Error::invalid_ref(branch, "branch can't be empty")),
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        Some(c) => {
            return Err(Error::invalid_ref(
                branch,
                format!("branch can't start with '{c}'"),
            ));
        }
    }
    if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))) {
        return Err(Error::invalid_ref(
            branch,
            format!("'{c}' not allowed in branch"),
        ));
    }
    Ok(())
}

/// Validate an arch name: `[A-Za-z0-9_]+`.
pub fn validate_arch(arch: &str) -> Result<()> {
    if arch.is_empty() {
        return Err(Error::invalid_ref(arch, "arch can't be empty"));
    }
    if let Some(c) = arch
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(Error::invalid_ref(arch, format!("'{c}' not allowed in arch")));
    }
    Ok(())
}

/// Heuristic for the old `REMOTE ID BRANCH` argument form.
///
/// A `/` never appears in a valid branch, so full or partial refs are never
/// taken as branches. Dots are legal in branches but rare, while ids require
/// them. The check is fuzzy: a dot-free id-like word is read as a branch.
pub fn looks_like_branch(arg: &str) -> bool {
    validate_branch(arg).is_ok() && !arg.contains('.')
}

/// Arch of the running host in reference naming.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_round_trips_through_display() {
        let reference: Reference = "app/org.foo.Bar/x86_64/stable"
            .parse()
            .expect("Failed to parse reference");
        assert_eq!(reference.kind(), RefKind::App);
        assert_eq!(reference.id(), "org.foo.Bar");
        assert_eq!(reference.short_name(), "org.foo.Bar/x86_64/stable");
        assert_eq!(reference.to_string(), "app/org.foo.Bar/x86_64/stable");
    }

    #[test]
    fn reference_rejects_missing_parts() {
        assert!("app/org.foo.Bar/x86_64".parse::<Reference>().is_err());
        assert!("lib/org.foo.Bar/x86_64/stable".parse::<Reference>().is_err());
        assert!("app/org.foo.Bar//stable".parse::<Reference>().is_err());
    }

    #[test]
    fn kind_mask_from_flags() {
        assert_eq!(KindMask::from_flags(false, false), KindMask::ALL);
        assert_eq!(KindMask::from_flags(true, false), KindMask::APP);
        assert_eq!(KindMask::from_flags(false, true), KindMask::RUNTIME);
        assert_eq!(
            KindMask::ALL.kinds().collect::<Vec<_>>(),
            vec![RefKind::App, RefKind::Runtime]
        );
    }

    #[test]
    fn partial_ref_bare_id_uses_defaults() {
        let pref = PartialRef::parse("org.foo.Bar", KindMask::ALL, Some("aarch64"), Some("beta"))
            .expect("Failed to parse partial ref");
        assert_eq!(pref.id, "org.foo.Bar");
        assert_eq!(pref.arch.as_deref(), Some("aarch64"));
        assert_eq!(pref.branch.as_deref(), Some("beta"));
        assert_eq!(pref.kinds, KindMask::ALL);
    }

    #[test]
    fn partial_ref_embedded_parts_beat_defaults() {
        let pref = PartialRef::parse(
            "org.foo.Bar/x86_64/stable",
            KindMask::ALL,
            Some("aarch64"),
            Some("beta"),
        )
        .expect("Failed to parse partial ref");
        assert_eq!(pref.arch.as_deref(), Some("x86_64"));
        assert_eq!(pref.branch.as_deref(), Some("stable"));
    }

    #[test]
    fn partial_ref_empty_arch_falls_back() {
        let pref = PartialRef::parse("org.foo.Bar//stable", KindMask::ALL, None, None)
            .expect("Failed to parse partial ref");
        assert_eq!(pref.arch, None);
        assert_eq!(pref.branch.as_deref(), Some("stable"));
    }

    #[test]
    fn partial_ref_kind_prefix_narrows_mask() {
        let pref = PartialRef::parse("runtime/org.foo.Platform", KindMask::ALL, None, None)
            .expect("Failed to parse partial ref");
        assert_eq!(pref.kinds, KindMask::RUNTIME);

        let err = PartialRef::parse("runtime/org.foo.Platform", KindMask::APP, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRef { .. }));
    }

    #[test]
    fn partial_ref_rejects_bad_ids() {
        assert!(PartialRef::parse("foo", KindMask::ALL, None, None).is_err());
        assert!(PartialRef::parse("org..Bar", KindMask::ALL, None, None).is_err());
        assert!(PartialRef::parse("org.1foo.Bar", KindMask::ALL, None, None).is_err());
        assert!(PartialRef::parse("a/b/c/d/e", KindMask::ALL, None, None).is_err());
    }

    #[test]
    fn looks_like_branch_heuristic() {
        assert!(looks_like_branch("stable"));
        assert!(looks_like_branch("master"));
        assert!(!looks_like_branch("org.foo.Baz"));
        assert!(!looks_like_branch("3.38"));
        assert!(!looks_like_branch("org.foo.Bar/x86_64"));
        assert!(!looks_like_branch(""));
    }

    #[test]
    fn partial_ref_matches_reference() {
        let pref = PartialRef::parse("org.foo.Bar", KindMask::APP, Some("x86_64"), None)
            .expect("Failed to parse partial ref");
        let app: Reference = "app/org.foo.Bar/x86_64/stable".parse().expect("Failed to parse reference");
        let runtime: Reference = "runtime/org.foo.Bar/x86_64/stable"
            .parse()
            .expect("Failed to parse reference");
        assert!(pref.matches(&app));
        assert!(!pref.matches(&runtime));
    }
}

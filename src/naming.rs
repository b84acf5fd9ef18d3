//! Rule based file naming
//!
//! A [`NamingRule`] describes how output file names are built from a date,
//! a base name and an instance number. The [`FileNameResolver`] applies such
//! a rule to source files, finding the lowest-numbered name which is still
//! free in the output directory.
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;

pub use self::pattern::{DatePattern, FormatDate, NumberFormat};
pub use self::probe::{FileProbe, OsProbe, Reserving};

mod pattern;
mod probe;

/// Upper bound on the number of candidates probed for a single file
pub const MAX_ATTEMPTS: u32 = 10_000;

/// Naming rule errors
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum RuleError {
    /// The date pattern cannot be compiled
    #[error("Invalid date pattern `{0}`: {1}")]
    InvalidDatePattern(String, &'static str),

    /// The number format is not a zero-padding pattern
    #[error("Invalid number format `{0}`")]
    InvalidNumberFormat(String),

    /// The rule file could not be parsed
    #[error(transparent)]
    InvalidConfig(#[from] toml::de::Error),
}

/// Name resolution errors
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum ResolveError {
    /// The source path does not end in a file name
    #[error("No file name in `{}`", .0.display())]
    MissingFileName(PathBuf),

    /// The existence probe failed
    #[error("Could not check whether `{}` exists", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every candidate name up to the attempt limit was taken
    #[error("Naming space exhausted for `{prefix}` after {attempts} attempts")]
    Exhausted { prefix: String, attempts: u32 },
}

/// A file naming rule
///
/// The rule is plain configuration; it is validated and compiled when a
/// [`FileNameResolver`] is constructed from it.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NamingRule {
    /// Date prefix pattern, e.g. `yyMM`
    pub date_pattern: Option<String>,
    /// Text following the date prefix
    pub name: Option<String>,
    /// Zero-padding pattern for the instance number, e.g. `000`
    pub number_format: Option<String>,
    /// Directory the generated names are placed in
    #[serde(default)]
    pub output_dir: PathBuf,
}

impl NamingRule {
    /// Parse a rule from its TOML representation
    pub fn from_toml(input: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(input)?)
    }
}

/// Resolves output file names according to a [`NamingRule`]
///
/// The rule itself never changes, but the resolver remembers the date prefix
/// and instance number of the previous request: consecutive files with the
/// same date prefix continue numbering where the last one left off.
pub struct FileNameResolver<P = OsProbe> {
    date_format: Option<Box<dyn FormatDate>>,
    base_name: String,
    number_format: Option<NumberFormat>,
    output_dir: PathBuf,
    probe: P,
    last_prefix: Option<String>,
    next_instance: u32,
}

impl<P> std::fmt::Debug for FileNameResolver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNameResolver")
            .field("date_format", &self.date_format.as_ref().map(|_| ".."))
            .field("base_name", &self.base_name)
            .field("number_format", &self.number_format)
            .field("output_dir", &self.output_dir)
            .field("last_prefix", &self.last_prefix)
            .field("next_instance", &self.next_instance)
            .finish()
    }
}

impl FileNameResolver<OsProbe> {
    /// Create a resolver checking names against the real file system
    pub fn new(rule: &NamingRule) -> Result<Self, RuleError> {
        Self::with_probe(rule, OsProbe)
    }
}

impl<P: FileProbe> FileNameResolver<P> {
    /// Create a resolver checking names with the given probe
    pub fn with_probe(rule: &NamingRule, probe: P) -> Result<Self, RuleError> {
        let date_pattern = as_optional_string(&rule.date_pattern)
            .map(DatePattern::new)
            .transpose()?;
        let number_format = as_optional_string(&rule.number_format)
            .map(NumberFormat::new)
            .transpose()?;
        if let Some(pattern) = &date_pattern {
            log::debug!("Date prefix `{pattern}` is {} characters wide", pattern.width());
        }
        if let Some(format) = &number_format {
            log::debug!("Instance numbers are padded to {} digits", format.min_digits());
        }
        let date_format = date_pattern.map(|pattern| Box::new(pattern) as Box<dyn FormatDate>);
        Ok(Self {
            date_format,
            base_name: rule.name.clone().unwrap_or_default(),
            number_format,
            output_dir: rule.output_dir.clone(),
            probe,
            last_prefix: None,
            next_instance: 0,
        })
    }

    /// Replace the date formatter
    #[cfg(test)]
    pub fn with_date_format(mut self, format: impl FormatDate + 'static) -> Self {
        self.date_format = Some(Box::new(format));
        self
    }

    /// The output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The date-derived prefix for `date`, if the rule has a date pattern
    pub fn date_prefix(&self, date: Option<&NaiveDateTime>) -> String {
        match (&self.date_format, date) {
            (Some(format), Some(date)) => format.format(date),
            _ => String::new(),
        }
    }

    /// Generate the file name for a date, instance number and extension
    ///
    /// Instance number 0 gets no numeric suffix at all; other instances are
    /// rendered with the rule's number format, or as plain integers.
    pub fn generate_file_name(
        &self,
        date: Option<&NaiveDateTime>,
        instance: u32,
        extension: &str,
    ) -> String {
        self.compose(&self.date_prefix(date), instance, extension)
    }

    fn compose(&self, prefix: &str, instance: u32, extension: &str) -> String {
        let suffix = match (instance, &self.number_format) {
            (0, _) => String::new(),
            (n, Some(format)) => format.format(n),
            (n, None) => n.to_string(),
        };
        format!("{prefix}{}{suffix}{extension}", self.base_name)
    }

    /// Check whether `file_name` has to be renamed to conform to the rule
    ///
    /// Only the head of the name is inspected: it must consist of a valid
    /// date prefix (if the rule has a date pattern) directly followed by the
    /// base name. Without a date pattern, a leading run of digits (typically
    /// a date stamp) is tolerated in front of the base name.
    pub fn must_rename(&self, file_name: &str) -> bool {
        if file_name.is_empty() {
            return true;
        }
        match &self.date_format {
            Some(format) => format
                .strip_prefix(file_name)
                .is_none_or(|rest| !rest.starts_with(&self.base_name)),
            None => {
                let undated = file_name.trim_start_matches(|c: char| c.is_ascii_digit());
                !(file_name.starts_with(&self.base_name) || undated.starts_with(&self.base_name))
            }
        }
    }

    /// Find the output path for `source`
    ///
    /// If the source name already conforms to the rule it is kept, with a
    /// `(n)` counter appended when that name is taken. Otherwise names are
    /// generated from `date`, starting at `first_instance` (or where the
    /// previous request with the same date prefix stopped), until a free one
    /// is found. Nothing is created on disk.
    pub fn next_file(
        &mut self,
        source: &Path,
        date: Option<&NaiveDateTime>,
        first_instance: u32,
    ) -> Result<PathBuf, ResolveError> {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ResolveError::MissingFileName(source.into()))?;
        let extension = extension(&name);

        if !self.must_rename(&name) {
            return self.keep_name(source, &name, extension);
        }

        let prefix = self.date_prefix(date);
        if self.last_prefix.as_deref() == Some(prefix.as_str()) {
            self.next_instance = self.next_instance.max(first_instance);
        } else {
            self.last_prefix = Some(prefix.clone());
            self.next_instance = first_instance;
        }

        for _ in 0..MAX_ATTEMPTS {
            let instance = self.next_instance;
            let candidate = self
                .output_dir
                .join(self.compose(&prefix, instance, extension));
            self.next_instance = instance.checked_add(1).ok_or_else(|| exhausted(&prefix))?;
            if !self.is_taken(&candidate, source)? {
                log::debug!("{} -> {}", source.display(), candidate.display());
                return Ok(candidate);
            }
        }
        Err(exhausted(&prefix))
    }

    /// Keep the source name, appending `(n)` until it is free
    fn keep_name(
        &self,
        source: &Path,
        name: &str,
        extension: &str,
    ) -> Result<PathBuf, ResolveError> {
        let candidate = self.output_dir.join(name);
        if !self.is_taken(&candidate, source)? {
            log::debug!("{} -> {} (unchanged)", source.display(), candidate.display());
            return Ok(candidate);
        }
        let stem = &name[..name.len() - extension.len()];
        for counter in 1..=MAX_ATTEMPTS {
            let candidate = self.output_dir.join(format!("{stem}({counter}){extension}"));
            if !self.is_taken(&candidate, source)? {
                log::debug!("{} -> {}", source.display(), candidate.display());
                return Ok(candidate);
            }
        }
        Err(exhausted(stem))
    }

    /// Whether `candidate` or one of its XMP sidecars already exists
    ///
    /// The source file (and therefore its own sidecars) never collides with
    /// itself, however its path is spelled.
    fn is_taken(&self, candidate: &Path, source: &Path) -> Result<bool, ResolveError> {
        if without_cur_dir(candidate) == without_cur_dir(source) {
            return Ok(false);
        }
        for path in [
            candidate.to_path_buf(),
            long_sidecar(candidate),
            candidate.with_extension("xmp"),
        ] {
            let exists = self
                .probe
                .exists(&path)
                .map_err(|source| ResolveError::Probe {
                    path: path.clone(),
                    source,
                })?;
            if exists {
                log::trace!("{} is taken", path.display());
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<P: FileProbe> FileNameResolver<Reserving<P>> {
    /// Resolve the next file and reserve it for the rest of the batch
    ///
    /// Both sidecar names of the target are reserved along with it, as the
    /// source's sidecar follows the image.
    pub fn reserve_next_file(
        &mut self,
        source: &Path,
        date: Option<&NaiveDateTime>,
        first_instance: u32,
    ) -> Result<PathBuf, ResolveError> {
        let target = self.next_file(source, date, first_instance)?;
        self.probe.reserve(target.with_extension("xmp"));
        self.probe.reserve(long_sidecar(&target));
        self.probe.reserve(&target);
        Ok(target)
    }
}

/// The extension of `file_name`, including the leading dot
///
/// Everything from the last `.` on counts as the extension; names without
/// a dot have an empty extension.
pub fn extension(file_name: &str) -> &str {
    file_name
        .rfind('.')
        .map(|idx| &file_name[idx..])
        .unwrap_or_default()
}

/// The long-form sidecar path, `name.jpg.xmp`
pub fn long_sidecar(path: &Path) -> PathBuf {
    let mut sidecar = OsString::from(path.as_os_str());
    sidecar.push(".xmp");
    sidecar.into()
}

/// `path` with all `.` components dropped
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| component != &Component::CurDir)
        .collect()
}

fn exhausted(prefix: &str) -> ResolveError {
    ResolveError::Exhausted {
        prefix: prefix.into(),
        attempts: MAX_ATTEMPTS,
    }
}

/// Converts `value` to `None` if empty, `Some(value)` otherwise
fn as_optional_string(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

//! Match specs: `name [version [build]]` queries against package records.

use std::fmt;

use chanmirror_core::{error::ResolutionError, package::PackageRecord};
use regex::Regex;

use crate::version::Version;

const OPERATORS: [&str; 8] = ["==", "!=", ">=", "<=", "~=", ">", "<", "="];

#[derive(Debug, Clone)]
enum Constraint {
    Any,
    Exact(Version),
    NotEqual(Version),
    Greater(Version),
    GreaterEq(Version),
    Less(Version),
    LessEq(Version),
    StartsWith(Version),
    NotStartsWith(Version),
    Compatible(Version),
    Glob(Regex),
}

impl Constraint {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Exact(v) => version == v,
            Constraint::NotEqual(v) => version != v,
            Constraint::Greater(v) => version > v,
            Constraint::GreaterEq(v) => version >= v,
            Constraint::Less(v) => version < v,
            Constraint::LessEq(v) => version <= v,
            Constraint::StartsWith(v) => version.starts_with(v),
            Constraint::NotStartsWith(v) => !version.starts_with(v),
            Constraint::Compatible(v) => {
                version >= v
                    && v
                        .truncated()
                        .map_or(true, |prefix| version.starts_with(&prefix))
            }
            Constraint::Glob(re) => re.is_match(version.as_str()),
        }
    }
}

/// `|`-separated alternatives of `,`-separated constraints.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    source: String,
    alternatives: Vec<Vec<Constraint>>,
}

impl VersionSpec {
    pub fn parse(value: &str) -> Result<Self, String> {
        let alternatives = value
            .split('|')
            .map(|alternative| {
                alternative
                    .split(',')
                    .map(|constraint| parse_constraint(constraint.trim()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: value.to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|all| all.iter().all(|constraint| constraint.matches(version)))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_operator(value: &str) -> (Option<&'static str>, &str) {
    OPERATORS
        .iter()
        .find(|op| value.starts_with(**op))
        .map(|op| (Some(*op), &value[op.len()..]))
        .unwrap_or((None, value))
}

/// `1.2.*` and `1.2*` become the prefix `1.2`; `None` if `*` appears anywhere else.
fn star_prefix(value: &str) -> Option<&str> {
    let prefix = value
        .strip_suffix(".*")
        .or_else(|| value.strip_suffix('*'))?;
    (!prefix.contains('*')).then_some(prefix)
}

fn parse_constraint(value: &str) -> Result<Constraint, String> {
    if value.is_empty() {
        return Err("empty version constraint".to_string());
    }
    if value == "*" {
        return Ok(Constraint::Any);
    }

    let (op, version) = split_operator(value);
    let version = version.trim();
    if version.is_empty() {
        return Err(format!("missing version after `{value}`"));
    }

    let has_star = version.contains('*');
    let constraint = match op {
        None | Some("==") => {
            match star_prefix(version) {
                Some(prefix) => Constraint::StartsWith(Version::parse(prefix)),
                None if has_star => Constraint::Glob(glob_to_regex(version)?),
                None => Constraint::Exact(Version::parse(version)),
            }
        }
        Some("=") => {
            match star_prefix(version) {
                Some(prefix) => Constraint::StartsWith(Version::parse(prefix)),
                None if has_star => Constraint::Glob(glob_to_regex(version)?),
                None => Constraint::StartsWith(Version::parse(version)),
            }
        }
        Some("!=") => {
            match star_prefix(version) {
                Some(prefix) => Constraint::NotStartsWith(Version::parse(prefix)),
                None if has_star => return Err(format!("unsupported glob in `{value}`")),
                None => Constraint::NotEqual(Version::parse(version)),
            }
        }
        Some(op) => {
            let version = Version::parse(star_prefix(version).unwrap_or(version));
            if has_star && version.as_str().contains('*') {
                return Err(format!("unsupported glob in `{value}`"));
            }
            match op {
                ">" => Constraint::Greater(version),
                ">=" => Constraint::GreaterEq(version),
                "<" => Constraint::Less(version),
                "<=" => Constraint::LessEq(version),
                _ => Constraint::Compatible(version),
            }
        }
    };
    Ok(constraint)
}

fn glob_to_regex(pattern: &str) -> Result<Regex, String> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).map_err(|err| err.to_string())
}

/// Joins constraint fragments that were written with spaces, such as `>= 1.0, <2`.
fn normalize_spacing(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for c in value.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            let joins = matches!(
                out.chars().last(),
                Some('=' | '<' | '>' | '!' | '~' | ',' | '|')
            ) || matches!(c, ',' | '|');
            if !joins {
                out.push(' ');
            }
        }
        pending_space = false;
        out.push(c);
    }
    out
}

#[derive(Debug, Clone)]
pub struct MatchSpec {
    pub name: String,
    version: Option<VersionSpec>,
    build: Option<Regex>,
    source: String,
}

impl MatchSpec {
    pub fn parse(spec: &str) -> Result<Self, ResolutionError> {
        let invalid = |reason: String| {
            ResolutionError::InvalidSpec {
                spec: spec.to_string(),
                reason,
            }
        };

        let mut body = spec.trim();
        if let Some(idx) = body.find('[') {
            body = body[..idx].trim_end();
        }
        if let Some((_, rest)) = body.rsplit_once("::") {
            body = rest;
        }
        if body.is_empty() {
            return Err(invalid("empty spec".to_string()));
        }

        let name_end = body
            .find(|c: char| c.is_whitespace() || "=<>!~".contains(c))
            .unwrap_or(body.len());
        let name = body[..name_end].to_lowercase();
        if name.is_empty() {
            return Err(invalid("missing package name".to_string()));
        }
        let rest = body[name_end..].trim();

        let (version, build) = if rest.is_empty() {
            (None, None)
        } else if body[name_end..].starts_with(char::is_whitespace) {
            let normalized = normalize_spacing(rest);
            let mut tokens = normalized.split(' ');
            let version = tokens.next().map(str::to_string);
            let build = tokens.next().map(str::to_string);
            if tokens.next().is_some() {
                return Err(invalid("expected `name [version [build]]`".to_string()));
            }
            (version, build)
        } else if rest.starts_with('=') && !rest.starts_with("==") {
            match rest[1..].split_once('=') {
                Some((version, build)) => (Some(format!("={version}")), Some(build.to_string())),
                None => (Some(rest.to_string()), None),
            }
        } else {
            (Some(normalize_spacing(rest)), None)
        };

        let version = version
            .map(|version| VersionSpec::parse(&version))
            .transpose()
            .map_err(invalid)?;
        let build = build
            .filter(|build| build != "*")
            .map(|build| glob_to_regex(&build))
            .transpose()
            .map_err(invalid)?;

        Ok(Self {
            name,
            version,
            build,
            source: spec.trim().to_string(),
        })
    }

    /// Virtual packages (`__glibc`, `__cuda`, ...) describe the host and have no artifact.
    pub fn is_virtual(&self) -> bool {
        self.name.starts_with("__")
    }

    pub fn matches(&self, record: &PackageRecord) -> bool {
        if record.name != self.name {
            return false;
        }
        if let Some(version) = &self.version {
            if !version.matches(&Version::parse(&record.version)) {
                return false;
            }
        }
        match &self.build {
            Some(build) => build.is_match(&record.build),
            None => true,
        }
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

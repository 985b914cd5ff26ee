//! Conda version ordering.
//!
//! A version is `[epoch!]release[+local]`. The release and local parts are split into
//! components on `.`, `_` and `-`, and each component into runs of digits and letters.
//! Numbers compare numerically, letters compare as strings and sort below numbers, `dev`
//! sorts below everything and `post` above everything. Missing components count as `0`,
//! so `1.0` equals `1.0.0`.

use std::{cmp::Ordering, fmt};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Dev,
    Alpha(String),
    Number(u64),
    Post,
}

type Component = Vec<Segment>;

const PAD: Segment = Segment::Number(0);

#[derive(Debug, Clone)]
pub struct Version {
    source: String,
    epoch: u64,
    release: Vec<Component>,
    local: Vec<Component>,
}

impl Version {
    pub fn parse(value: &str) -> Self {
        let source = value.trim().to_string();
        let normalized = source.to_lowercase();

        let (epoch, rest) = match normalized.split_once('!') {
            Some((epoch, rest)) => {
                match epoch.parse() {
                    Ok(epoch) => (epoch, rest),
                    Err(_) => (0, normalized.as_str()),
                }
            }
            None => (0, normalized.as_str()),
        };
        let (release, local) = rest.split_once('+').unwrap_or((rest, ""));

        Self {
            epoch,
            release: parse_components(release),
            local: parse_components(local),
            source,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.release.is_empty()
    }

    /// Whether the leading release components equal those of `prefix` (`1.2.*` semantics).
    pub fn starts_with(&self, prefix: &Version) -> bool {
        if self.epoch != prefix.epoch {
            return false;
        }
        prefix.release.iter().enumerate().all(|(idx, component)| {
            let own = self.release.get(idx).map(Vec::as_slice).unwrap_or(&[]);
            compare_component(own, component) == Ordering::Equal
        })
    }

    /// The version with its last release component dropped, used by `~=`.
    pub fn truncated(&self) -> Option<Version> {
        if self.release.len() < 2 {
            return None;
        }
        let mut release = self.release.clone();
        release.pop();
        Some(Self {
            source: self.source.clone(),
            epoch: self.epoch,
            release,
            local: Vec::new(),
        })
    }
}

fn parse_components(value: &str) -> Vec<Component> {
    value
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .map(parse_component)
        .collect()
}

fn parse_component(part: &str) -> Component {
    let mut segments = Vec::new();
    let mut chars = part.chars().peekable();

    while let Some(&first) = chars.peek() {
        let mut run = String::new();
        let numeric = first.is_ascii_digit();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != numeric {
                break;
            }
            run.push(c);
            chars.next();
        }

        let segment = if numeric {
            Segment::Number(run.parse().unwrap_or(u64::MAX))
        } else {
            match run.as_str() {
                "dev" => Segment::Dev,
                "post" => Segment::Post,
                _ => Segment::Alpha(run),
            }
        };
        segments.push(segment);
    }

    if !matches!(segments.first(), Some(Segment::Number(_))) {
        segments.insert(0, PAD);
    }
    segments
}

fn compare_component(a: &[Segment], b: &[Segment]) -> Ordering {
    let len = a.len().max(b.len());
    for idx in 0..len {
        let left = a.get(idx).unwrap_or(&PAD);
        let right = b.get(idx).unwrap_or(&PAD);
        match left.cmp(right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn compare_components(a: &[Component], b: &[Component]) -> Ordering {
    let pad = vec![PAD];
    let len = a.len().max(b.len());
    for idx in 0..len {
        let left = a.get(idx).unwrap_or(&pad);
        let right = b.get(idx).unwrap_or(&pad);
        match compare_component(left, right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_components(&self.release, &other.release))
            .then_with(|| compare_components(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

//! Format-preserving property access for MSBuild project files.
//!
//! Only `<PropertyGroup>` children are touched. Everything else in the file
//! (comments, item groups, indentation, line endings, a leading BOM) is kept
//! byte-for-byte, so a version bump shows up as a one-line diff.

use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::Regex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::DescriptorError;

/// Property holding the package version.
pub const PACKAGE_VERSION: &str = "PackageVersion";

/// Property holding the package id.
pub const PACKAGE_ID: &str = "PackageId";

/// Evaluated build properties, keyed by property name.
pub type PackageMetadata = BTreeMap<String, String>;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex"));

static PROJECT_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Project(?:\s[^>]*)?>").expect("Invalid regex"));

static GROUP_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<PropertyGroup(?:\s[^>]*)?>").expect("Invalid regex"));

static GROUP_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</PropertyGroup\s*>").expect("Invalid regex"));

static CONDITION_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)Condition\s*=").expect("Invalid regex"));

static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.\-]*)((?:\s[^>]*?)?)(?:/>|>([^<]*)</([A-Za-z_][\w.\-]*)\s*>)")
        .expect("Invalid regex")
});

#[derive(Debug)]
struct GroupSpan {
    open: Range<usize>,
    close: Range<usize>,
    conditioned: bool,
}

#[derive(Debug)]
struct PropertySpan {
    name: String,
    element: Range<usize>,
    /// `None` for a self-closing element.
    value: Option<Range<usize>>,
    conditioned: bool,
}

/// An MSBuild project file held in memory.
#[derive(Debug, Clone)]
pub struct MsBuildProject {
    path: PathBuf,
    content: String,
}

impl MsBuildProject {
    /// Read and validate a project file.
    pub fn open(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, content)
    }

    /// Wrap already-loaded content. Fails if there is no `<Project>` root.
    pub fn parse(path: impl Into<PathBuf>, content: String) -> Result<Self, DescriptorError> {
        let project = Self {
            path: path.into(),
            content,
        };
        project.project_open()?;
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Value of an unconditioned property. The last definition wins, as in
    /// MSBuild evaluation.
    pub fn property(&self, name: &str) -> Option<String> {
        self.unconditioned_properties()
            .into_iter()
            .rfind(|p| p.name == name)
            .map(|p| self.decoded_value(&p))
    }

    /// All unconditioned properties.
    pub fn metadata(&self) -> PackageMetadata {
        let mut metadata = PackageMetadata::new();
        for prop in self.unconditioned_properties() {
            let value = self.decoded_value(&prop);
            metadata.insert(prop.name, value);
        }
        metadata
    }

    /// Set a property the way MSBuild's `AddProperty` does.
    ///
    /// Updates the last unconditioned definition if there is one, otherwise
    /// appends to the first unconditioned `<PropertyGroup>`. Failing that, a
    /// new group goes after the last existing `<PropertyGroup>`, or at the top
    /// of `<Project>` when there are none.
    pub fn set_property(&mut self, name: &str, value: &str) -> Result<(), DescriptorError> {
        let encoded = escape_xml(value);
        let element = format!("<{name}>{encoded}</{name}>");

        if let Some(existing) = self
            .unconditioned_properties()
            .into_iter()
            .rfind(|p| p.name == name)
        {
            debug!(property = name, "Updating existing property");
            match existing.value {
                Some(range) => self.content.replace_range(range, &encoded),
                None => self.content.replace_range(existing.element, &element),
            }
            return Ok(());
        }

        let newline = self.newline();
        let unit = self.indent_unit();
        let groups = self.property_groups();

        if let Some(group) = groups.iter().find(|g| !g.conditioned) {
            debug!(property = name, "Appending property to existing group");
            let props = self.properties_in(group);
            if let Some(last) = props.last() {
                let indent = line_indent(&self.content, last.element.start);
                let insert = format!("{newline}{indent}{element}");
                self.content.insert_str(last.element.end, &insert);
            } else {
                let group_indent = line_indent(&self.content, group.open.start);
                let mut insert = format!("{newline}{group_indent}{unit}{element}");
                if !self.content[group.open.end..group.close.start].contains('\n') {
                    insert.push_str(newline);
                    insert.push_str(group_indent);
                }
                self.content.insert_str(group.open.end, &insert);
            }
            return Ok(());
        }

        debug!(property = name, "Creating new PropertyGroup");
        let (at, group_indent) = match groups.last() {
            Some(last) => (
                last.close.end,
                line_indent(&self.content, last.open.start).to_string(),
            ),
            None => {
                let project_open = self.project_open()?;
                let indent = format!("{}{unit}", line_indent(&self.content, project_open.start));
                (project_open.end, indent)
            }
        };
        let insert = format!(
            "{newline}{group_indent}<PropertyGroup>{newline}{group_indent}{unit}{element}{newline}{group_indent}</PropertyGroup>"
        );
        self.content.insert_str(at, &insert);
        Ok(())
    }

    /// Write the content back atomically, keeping the file's permissions.
    pub fn save(&self) -> Result<(), DescriptorError> {
        let write_err = |source| DescriptorError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(self.content.as_bytes()).map_err(write_err)?;
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(write_err)?;
        }
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(path = %self.path.display(), "Saved project file");
        Ok(())
    }

    fn decoded_value(&self, prop: &PropertySpan) -> String {
        prop.value
            .as_ref()
            .map(|range| unescape_xml(self.content[range.clone()].trim()))
            .unwrap_or_default()
    }

    fn comments(&self) -> Vec<Range<usize>> {
        COMMENT_RE
            .find_iter(&self.content)
            .map(|m| m.range())
            .collect()
    }

    fn project_open(&self) -> Result<Range<usize>, DescriptorError> {
        let comments = self.comments();
        PROJECT_OPEN_RE
            .find_iter(&self.content)
            .find(|m| !in_ranges(&comments, m.start()) && !m.as_str().ends_with("/>"))
            .map(|m| m.range())
            .ok_or_else(|| DescriptorError::Malformed {
                path: self.path.clone(),
                reason: "missing <Project> root element".into(),
            })
    }

    fn property_groups(&self) -> Vec<GroupSpan> {
        let comments = self.comments();
        let mut groups = Vec::new();

        for open in GROUP_OPEN_RE.find_iter(&self.content) {
            if in_ranges(&comments, open.start()) || open.as_str().ends_with("/>") {
                continue;
            }

            let close = GROUP_CLOSE_RE
                .find_iter(&self.content[open.end()..])
                .find(|m| !in_ranges(&comments, open.end() + m.start()));

            if let Some(close) = close {
                groups.push(GroupSpan {
                    open: open.range(),
                    close: open.end() + close.start()..open.end() + close.end(),
                    conditioned: has_condition(open.as_str()),
                });
            }
        }

        groups
    }

    fn properties_in(&self, group: &GroupSpan) -> Vec<PropertySpan> {
        let comments = self.comments();
        let base = group.open.end;
        let body = &self.content[base..group.close.start];

        PROPERTY_RE
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if in_ranges(&comments, base + whole.start()) {
                    return None;
                }

                let name = caps.get(1)?.as_str();
                if let Some(closing) = caps.get(4)
                    && closing.as_str() != name
                {
                    return None;
                }

                let attrs = caps.get(2).map_or("", |m| m.as_str());
                Some(PropertySpan {
                    name: name.to_string(),
                    element: base + whole.start()..base + whole.end(),
                    value: caps.get(3).map(|m| base + m.start()..base + m.end()),
                    conditioned: group.conditioned || has_condition(attrs),
                })
            })
            .collect()
    }

    fn unconditioned_properties(&self) -> Vec<PropertySpan> {
        self.property_groups()
            .iter()
            .filter(|g| !g.conditioned)
            .flat_map(|g| self.properties_in(g))
            .filter(|p| !p.conditioned)
            .collect()
    }

    fn newline(&self) -> &'static str {
        if self.content.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Indentation of the first indented element line, or two spaces.
    fn indent_unit(&self) -> String {
        self.content
            .lines()
            .find_map(|line| {
                let trimmed = line.trim_start();
                let indent = &line[..line.len() - trimmed.len()];
                (!indent.is_empty() && trimmed.starts_with('<')).then(|| indent.to_string())
            })
            .unwrap_or_else(|| "  ".to_string())
    }
}

/// True if the tag text carries a `Condition` attribute.
fn has_condition(tag: &str) -> bool {
    CONDITION_ATTR_RE.is_match(tag)
}

fn in_ranges(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(&pos))
}

/// Leading whitespace of the line containing `pos`.
fn line_indent(content: &str, pos: usize) -> &str {
    let line_start = content[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &content[line_start..pos];
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

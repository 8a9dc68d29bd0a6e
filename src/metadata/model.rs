//! `maven-metadata.xml` document model
//!
//! Only the elements that take part in merging are modelled; anything else
//! in a member's document is dropped from the merged output.

use crate::error::{RepodexError, RepodexResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub versioning: Option<Versioning>,
    pub plugins: Vec<Plugin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioning {
    pub latest: Option<String>,
    pub release: Option<String>,
    pub snapshot: Option<Snapshot>,
    pub versions: Vec<String>,
    pub last_updated: Option<String>,
    pub snapshot_versions: Vec<SnapshotVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: Option<String>,
    pub build_number: Option<u32>,
    pub local_copy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub classifier: Option<String>,
    pub extension: String,
    pub value: String,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plugin {
    pub name: Option<String>,
    pub prefix: String,
    pub artifact_id: String,
}

impl Metadata {
    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .map(|v| v.versions.as_slice())
            .unwrap_or(&[])
    }

    pub fn snapshot_versions(&self) -> &[SnapshotVersion] {
        self.versioning
            .as_ref()
            .map(|v| v.snapshot_versions.as_slice())
            .unwrap_or(&[])
    }

    /// True when the document carries anything worth serving
    pub fn has_content(&self) -> bool {
        !self.versions().is_empty()
            || !self.snapshot_versions().is_empty()
            || !self.plugins.is_empty()
    }

    pub fn parse(text: &str, path: &str) -> RepodexResult<Self> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| RepodexError::metadata_parse(path, e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != "metadata" {
            return Err(RepodexError::metadata_parse(
                path,
                format!("unexpected root element <{}>", root.tag_name().name()),
            ));
        }

        let versioning = child_element(&root, "versioning").map(|node| Versioning {
            latest: child_text(&node, "latest"),
            release: child_text(&node, "release"),
            snapshot: child_element(&node, "snapshot").map(|s| Snapshot {
                timestamp: child_text(&s, "timestamp"),
                build_number: child_text(&s, "buildNumber").and_then(|n| n.parse().ok()),
                local_copy: child_text(&s, "localCopy").as_deref() == Some("true"),
            }),
            versions: child_element(&node, "versions")
                .map(|vs| children_text(&vs, "version"))
                .unwrap_or_default(),
            last_updated: child_text(&node, "lastUpdated"),
            snapshot_versions: child_element(&node, "snapshotVersions")
                .map(|svs| {
                    elements(&svs, "snapshotVersion")
                        .filter_map(|sv| {
                            Some(SnapshotVersion {
                                classifier: child_text(&sv, "classifier"),
                                extension: child_text(&sv, "extension")?,
                                value: child_text(&sv, "value")?,
                                updated: child_text(&sv, "updated"),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
        });

        let plugins = child_element(&root, "plugins")
            .map(|ps| {
                elements(&ps, "plugin")
                    .filter_map(|p| {
                        Some(Plugin {
                            name: child_text(&p, "name"),
                            prefix: child_text(&p, "prefix")?,
                            artifact_id: child_text(&p, "artifactId")?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            group_id: child_text(&root, "groupId"),
            artifact_id: child_text(&root, "artifactId"),
            version: child_text(&root, "version"),
            versioning,
            plugins,
        })
    }

    pub fn parse_bytes(data: &[u8], path: &str) -> RepodexResult<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| RepodexError::metadata_parse(path, e.to_string()))?;
        Self::parse(text, path)
    }

    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::default();
        w.raw("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        w.open("metadata");
        w.opt("groupId", &self.group_id);
        w.opt("artifactId", &self.artifact_id);
        w.opt("version", &self.version);

        if let Some(v) = &self.versioning {
            w.open("versioning");
            w.opt("latest", &v.latest);
            w.opt("release", &v.release);
            if let Some(s) = &v.snapshot {
                w.open("snapshot");
                w.opt("timestamp", &s.timestamp);
                w.opt("buildNumber", &s.build_number.map(|n| n.to_string()));
                if s.local_copy {
                    w.text("localCopy", "true");
                }
                w.close("snapshot");
            }
            if !v.versions.is_empty() {
                w.open("versions");
                for version in &v.versions {
                    w.text("version", version);
                }
                w.close("versions");
            }
            w.opt("lastUpdated", &v.last_updated);
            if !v.snapshot_versions.is_empty() {
                w.open("snapshotVersions");
                for sv in &v.snapshot_versions {
                    w.open("snapshotVersion");
                    w.opt("classifier", &sv.classifier);
                    w.text("extension", &sv.extension);
                    w.text("value", &sv.value);
                    w.opt("updated", &sv.updated);
                    w.close("snapshotVersion");
                }
                w.close("snapshotVersions");
            }
            w.close("versioning");
        }

        if !self.plugins.is_empty() {
            w.open("plugins");
            for p in &self.plugins {
                w.open("plugin");
                w.opt("name", &p.name);
                w.text("prefix", &p.prefix);
                w.text("artifactId", &p.artifact_id);
                w.close("plugin");
            }
            w.close("plugins");
        }

        w.close("metadata");
        w.finish()
    }
}

fn child_element<'a>(
    node: &'a roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn elements<'a, 'input: 'a>(
    node: &roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn children_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Vec<String> {
    elements(node, name)
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    fn raw(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn open(&mut self, tag: &str) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }

    fn text(&mut self, tag: &str, value: &str) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push('>');
        for c in value.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                c => self.out.push(c),
            }
        }
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }

    fn opt(&mut self, tag: &str, value: &Option<String>) {
        if let Some(value) = value {
            self.text(tag, value);
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

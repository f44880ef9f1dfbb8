//! File categories and their ordering
//!
//! Theme files reference each other: templates name sections, sections
//! render blocks, and settings data must satisfy the settings schema. Every
//! key is assigned exactly one [`FileCategory`], and the categories are
//! arranged into stages so that a file is only uploaded after the files it
//! references, and only deleted after the files referencing it.

use std::collections::BTreeMap;
use std::fmt;

use themesync_core::domain::{AssetKey, Checksum, ChecksumWithSize};

/// File name of the settings schema under `config/`
pub const SETTINGS_SCHEMA_FILE: &str = "settings_schema.json";

/// Dependency category of a theme file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileCategory {
    /// `blocks/*.liquid`
    BlockLiquid,
    /// `sections/*.liquid`
    SectionLiquid,
    /// Any other Liquid file (layout, snippets, templates, liquid assets)
    OtherLiquid,
    /// `sections/*.json` section groups
    SectionJson,
    /// `templates/**/*.json`
    TemplateJson,
    /// Template JSON with a `.context.` marker, e.g. `templates/index.context.b2b.json`
    ContextualizedJson,
    /// Any other JSON (mostly locales)
    OtherJson,
    /// `config/settings_schema.json`
    SettingsSchema,
    /// Remaining `config/*.json`, e.g. `config/settings_data.json`
    Config,
    /// Everything else (images, stylesheets, scripts, fonts)
    StaticAsset,
}

impl FileCategory {
    /// Categories uploaded concurrently with everything else
    pub const INDEPENDENT_UPLOADS: [FileCategory; 3] = [
        FileCategory::OtherLiquid,
        FileCategory::OtherJson,
        FileCategory::StaticAsset,
    ];

    /// Categories uploaded one stage at a time, in this order
    pub const DEPENDENT_UPLOADS: [FileCategory; 7] = [
        FileCategory::BlockLiquid,
        FileCategory::SectionLiquid,
        FileCategory::SectionJson,
        FileCategory::TemplateJson,
        FileCategory::ContextualizedJson,
        FileCategory::SettingsSchema,
        FileCategory::Config,
    ];

    /// Delete stages, each deleted concurrently, stages in this order
    pub const DELETE_STAGES: [&'static [FileCategory]; 5] = [
        &[FileCategory::ContextualizedJson],
        &[
            FileCategory::TemplateJson,
            FileCategory::SectionJson,
            FileCategory::OtherJson,
        ],
        &[
            FileCategory::SectionLiquid,
            FileCategory::BlockLiquid,
            FileCategory::OtherLiquid,
        ],
        &[FileCategory::Config, FileCategory::SettingsSchema],
        &[FileCategory::StaticAsset],
    ];

    /// Assigns a key to its category
    pub fn of(key: &AssetKey) -> Self {
        let extension = key.extension();

        if extension == Some("liquid") {
            return if key.is_in("blocks") {
                Self::BlockLiquid
            } else if key.is_in("sections") {
                Self::SectionLiquid
            } else {
                Self::OtherLiquid
            };
        }

        if extension == Some("json") {
            return if key.is_in("templates") && key.file_name().contains(".context.") {
                Self::ContextualizedJson
            } else if key.is_in("config") {
                if key.file_name() == SETTINGS_SCHEMA_FILE {
                    Self::SettingsSchema
                } else {
                    Self::Config
                }
            } else if key.is_in("sections") {
                Self::SectionJson
            } else if key.is_in("templates") {
                Self::TemplateJson
            } else {
                Self::OtherJson
            };
        }

        Self::StaticAsset
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BlockLiquid => "block liquid",
            Self::SectionLiquid => "section liquid",
            Self::OtherLiquid => "other liquid",
            Self::SectionJson => "section json",
            Self::TemplateJson => "template json",
            Self::ContextualizedJson => "contextualized json",
            Self::OtherJson => "other json",
            Self::SettingsSchema => "settings schema",
            Self::Config => "config",
            Self::StaticAsset => "static asset",
        };
        f.write_str(name)
    }
}

/// Anything carrying an asset key
pub trait Keyed {
    fn asset_key(&self) -> &AssetKey;
}

impl Keyed for AssetKey {
    fn asset_key(&self) -> &AssetKey {
        self
    }
}

impl Keyed for Checksum {
    fn asset_key(&self) -> &AssetKey {
        &self.key
    }
}

impl Keyed for ChecksumWithSize {
    fn asset_key(&self) -> &AssetKey {
        &self.key
    }
}

/// Files grouped by category, input order preserved within a category
#[derive(Debug, Clone)]
pub struct Partition<T> {
    groups: BTreeMap<FileCategory, Vec<T>>,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<T: Keyed> Partition<T> {
    /// Groups files by category
    ///
    /// Within the other-JSON category, locale files come last.
    pub fn new(files: impl IntoIterator<Item = T>) -> Self {
        let mut groups: BTreeMap<FileCategory, Vec<T>> = BTreeMap::new();
        for file in files {
            groups
                .entry(FileCategory::of(file.asset_key()))
                .or_default()
                .push(file);
        }

        if let Some(json) = groups.get_mut(&FileCategory::OtherJson) {
            json.sort_by_key(|file| file.asset_key().is_in("locales"));
        }

        Self { groups }
    }

    /// Removes and returns the files of a category
    pub fn take(&mut self, category: FileCategory) -> Vec<T> {
        self.groups.remove(&category).unwrap_or_default()
    }

    /// Files of a category
    pub fn get(&self, category: FileCategory) -> &[T] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Upload order: independent groups plus the sequential dependent pipeline
#[derive(Debug, Clone)]
pub struct UploadOrder<T> {
    pub independent: Vec<(FileCategory, Vec<T>)>,
    pub dependent: Vec<(FileCategory, Vec<T>)>,
}

/// Splits files into the independent and dependent upload groups
///
/// Empty categories are dropped.
pub fn order_for_upload<T: Keyed>(files: impl IntoIterator<Item = T>) -> UploadOrder<T> {
    let mut partition = Partition::new(files);
    let mut take_all = |categories: &[FileCategory]| -> Vec<(FileCategory, Vec<T>)> {
        categories
            .iter()
            .map(|&category| (category, partition.take(category)))
            .filter(|(_, files)| !files.is_empty())
            .collect()
    };

    let independent = take_all(&FileCategory::INDEPENDENT_UPLOADS[..]);
    let dependent = take_all(&FileCategory::DEPENDENT_UPLOADS[..]);
    UploadOrder {
        independent,
        dependent,
    }
}

/// Splits files into sequential delete stages
///
/// Empty stages are dropped.
pub fn order_for_delete<T: Keyed>(files: impl IntoIterator<Item = T>) -> Vec<Vec<T>> {
    let mut partition = Partition::new(files);
    FileCategory::DELETE_STAGES
        .iter()
        .map(|categories| {
            categories
                .iter()
                .flat_map(|&category| partition.take(category))
                .collect::<Vec<T>>()
        })
        .filter(|stage| !stage.is_empty())
        .collect()
}

//! Sitemap coverage: which pages on disk the sitemap lists, and which it does not.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{config::Config, sitemap::Sitemap};

fn html_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        })
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "html"))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Default, PartialEq)]
pub struct Coverage {
    pub listed: BTreeSet<String>,
    pub on_disk: BTreeSet<String>,
}

impl Coverage {
    pub fn collect(config: &Config, root: &Path) -> anyhow::Result<Self> {
        let path = root.join(&config.sitemap);
        let xml = std::fs::read_to_string(&path)
            .with_context(|| format!("reading sitemap {}", path.display()))?;
        let sitemap = Sitemap::parse(&xml)
            .with_context(|| format!("parsing sitemap {}", path.display()))?;

        let base_url = config.base_url();
        let mut on_disk = BTreeSet::new();

        for file in html_files(root) {
            match file_name(&file).as_str() {
                "index.html" => on_disk.insert(format!("{}/", base_url)),
                name => on_disk.insert(format!("{}/{}", base_url, name)),
            };
        }

        for collection in &config.collections {
            let template = root.join(&collection.template);

            for file in html_files(&root.join(&collection.dir)) {
                if file == template {
                    continue;
                }
                on_disk.insert(format!(
                    "{}/{}/{}",
                    base_url,
                    collection.url_dir(),
                    file_name(&file)
                ));
            }
        }

        Ok(Self {
            listed: sitemap
                .entries()
                .iter()
                .map(|entry| entry.loc.clone())
                .collect(),
            on_disk,
        })
    }

    /// Pages on disk the sitemap does not list.
    pub fn missing(&self) -> Vec<&str> {
        self.on_disk
            .difference(&self.listed)
            .map(String::as_str)
            .collect()
    }

    /// Sitemap URLs without a page, deleted files or hand-added special pages.
    pub fn extra(&self) -> Vec<&str> {
        self.listed
            .difference(&self.on_disk)
            .map(String::as_str)
            .collect()
    }

    pub fn percent(&self) -> f64 {
        if self.on_disk.is_empty() {
            return 100.0;
        }

        let covered = self.on_disk.len() - self.missing().len();
        covered as f64 * 100.0 / self.on_disk.len() as f64
    }
}

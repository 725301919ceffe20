use anyhow::{Context, Result};
use seqatlas_core::Point;
use serde::{Deserialize, Serialize};

use crate::util::config::ViewerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoTerm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ontology: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PdbLocation {
    pdb_loc: String,
}

/// Blocking client for the request/response endpoints that sit beside the
/// streaming channel (search, GO terms, structures).
#[derive(Debug, Clone)]
pub struct Lookups {
    base_url: String,
}

impl Lookups {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn from_config(cfg: &ViewerConfig) -> Self {
        Self::new(cfg.lookup_base_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn name_search(&self, name: &str) -> Result<Vec<Point>> {
        let url = self.url("name_search");
        ureq::get(&url)
            .query("name", name)
            .call()
            .with_context(|| format!("name search for {name:?}"))?
            .into_body()
            .read_json()
            .context("decode name search response")
    }

    pub fn go_autocomplete(&self, prefix: &str) -> Result<Vec<GoTerm>> {
        let url = self.url("go_autocomplete");
        ureq::get(&url)
            .query("query", prefix)
            .call()
            .with_context(|| format!("GO autocomplete for {prefix:?}"))?
            .into_body()
            .read_json()
            .context("decode GO autocomplete response")
    }

    pub fn go_term(&self, id: &str) -> Result<GoTerm> {
        let url = self.url(&format!("go/{id}"));
        ureq::get(&url)
            .call()
            .with_context(|| format!("GO term {id}"))?
            .into_body()
            .read_json()
            .context("decode GO term")
    }

    pub fn pdb_location(&self, name: &str) -> Result<String> {
        let url = self.url("pdb_loc");
        let loc: PdbLocation = ureq::get(&url)
            .query("name", name)
            .call()
            .with_context(|| format!("PDB location for {name:?}"))?
            .into_body()
            .read_json()
            .context("decode PDB location")?;
        Ok(loc.pdb_loc)
    }

    pub fn structure_url(&self, pdb_loc: &str) -> String {
        self.url(&format!("pdb/{}", pdb_loc.trim_start_matches('/')))
    }

    /// Raw PDB text for the structure viewer.
    pub fn structure(&self, pdb_loc: &str) -> Result<String> {
        let url = self.structure_url(pdb_loc);
        tracing::info!(%url, "fetching structure");
        ureq::get(&url)
            .call()
            .with_context(|| format!("download structure {pdb_loc}"))?
            .into_body()
            .read_to_string()
            .context("read structure body")
    }
}

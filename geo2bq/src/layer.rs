//! Couches nommées (entrée du chargement de couche)
//!
//! Un `Project` est un registre de couches en mémoire, chargé depuis un
//! répertoire de fichiers GeoJSON : une couche par fichier, nommée d'après
//! le nom du fichier sans extension.

use std::path::{Path, PathBuf};

use geoprep::{read_features, Feature, FeatureSet, GeoprepError, WGS84_EPSG};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Erreurs d'accès aux couches
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Layer not found: {name} (available: {available})")]
    NotFound { name: String, available: String },

    #[error("Failed to read layer {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: GeoprepError,
    },

    #[error("Failed to list project directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Couche exposant ses champs et ses features
pub trait Layer {
    /// Nom de la couche
    fn name(&self) -> &str;

    /// Noms des champs attributaires, dans l'ordre de la couche
    fn field_names(&self) -> &[String];

    /// Features de la couche
    fn features(&self) -> &[Feature];

    /// CRS des géométries
    fn epsg(&self) -> u32 {
        WGS84_EPSG
    }
}

/// Couche en mémoire
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    name: String,
    fields: Vec<String>,
    features: Vec<Feature>,
    epsg: u32,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>, fields: Vec<String>, features: Vec<Feature>, epsg: u32) -> Self {
        Self {
            name: name.into(),
            fields,
            features,
            epsg,
        }
    }

    /// Crée une couche depuis un fichier lu par geoprep
    pub fn from_feature_set(name: impl Into<String>, set: FeatureSet) -> Self {
        Self::new(name, set.fields, set.features, set.epsg)
    }
}

impl Layer for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_names(&self) -> &[String] {
        &self.fields
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn epsg(&self) -> u32 {
        self.epsg
    }
}

/// Registre de couches nommées
#[derive(Debug, Default)]
pub struct Project {
    layers: Vec<MemoryLayer>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge chaque fichier `.geojson` / `.json` d'un répertoire comme une couche
    pub fn load_dir(dir: &Path) -> Result<Self, LayerError> {
        let io_error = |source| LayerError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_error)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| matches!(ext.to_ascii_lowercase().as_str(), "geojson" | "json"))
            })
            .collect();
        paths.sort();

        let mut project = Self::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                warn!(path = %path.display(), "Skipping file with non UTF-8 name");
                continue;
            };

            let set = read_features(&path).map_err(|source| LayerError::Read {
                path: path.clone(),
                source,
            })?;
            debug!(layer = %name, features = set.len(), "Loaded layer");
            project.add_layer(MemoryLayer::from_feature_set(name, set));
        }

        info!(dir = %dir.display(), layers = project.layers.len(), "Project loaded");
        Ok(project)
    }

    pub fn add_layer(&mut self, layer: MemoryLayer) {
        self.layers.push(layer);
    }

    /// Noms des couches, dans l'ordre d'ajout
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Toutes les couches portant ce nom
    pub fn map_layers_by_name(&self, name: &str) -> Vec<&MemoryLayer> {
        self.layers.iter().filter(|l| l.name() == name).collect()
    }

    /// Première couche portant ce nom
    pub fn map_layer_by_name(&self, name: &str) -> Result<&MemoryLayer, LayerError> {
        self.map_layers_by_name(name)
            .into_iter()
            .next()
            .ok_or_else(|| LayerError::NotFound {
                name: name.to_string(),
                available: self.layer_names().join(", "),
            })
    }
}
